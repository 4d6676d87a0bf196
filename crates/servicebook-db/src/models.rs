//! Database models - mapped from PostgreSQL tables
//!
//! Status-like columns are stored as TEXT; typed accessors parse them into
//! domain enums.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use servicebook_types::{
    BalanceKind, Balances, BookingMode, BookingStatus, CommissionSplit, DisputeFavor, EvidenceType,
    Interval, Participants, PaymentStatus, PricingType, TransactionType,
};
use sqlx::FromRow;
use uuid::Uuid;

use crate::DbResult;

// ============================================================================
// Booking Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbBooking {
    pub id: Uuid,
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub service_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
    pub booking_mode: String,
    pub total_price: Decimal,
    pub notes: Option<String>,
    pub payment_status: Option<String>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub provider_completed_at: Option<DateTime<Utc>>,
    pub completion_notes: Option<String>,
    pub client_confirmed_at: Option<DateTime<Utc>>,
    pub confirmation_warning_sent_at: Option<DateTime<Utc>>,
    pub dispute_raised: bool,
    pub dispute_reason: Option<String>,
    pub dispute_raised_at: Option<DateTime<Utc>>,
    pub dispute_resolution: Option<String>,
    pub dispute_resolved_by: Option<Uuid>,
    pub dispute_resolved_at: Option<DateTime<Utc>>,
    pub original_start: Option<DateTime<Utc>>,
    pub original_end: Option<DateTime<Utc>>,
    pub reschedule_count: i32,
    pub reschedule_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbBooking {
    pub fn status(&self) -> DbResult<BookingStatus> {
        Ok(self.status.parse()?)
    }

    pub fn mode(&self) -> DbResult<BookingMode> {
        Ok(self.booking_mode.parse()?)
    }

    pub fn interval(&self) -> DbResult<Interval> {
        Ok(Interval::new(self.start_time, self.end_time)?)
    }

    pub fn payment_status(&self) -> DbResult<Option<PaymentStatus>> {
        Ok(self.payment_status.as_deref().map(str::parse::<PaymentStatus>).transpose()?)
    }
}

/// Fields for a new booking row
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub service_id: Uuid,
    pub interval: Interval,
    pub status: BookingStatus,
    pub mode: BookingMode,
    pub total_price: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbEvidence {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub evidence_type: String,
    pub file_url: String,
    pub description: Option<String>,
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
}

impl DbEvidence {
    pub fn evidence_type(&self) -> DbResult<EvidenceType> {
        Ok(self.evidence_type.parse()?)
    }
}

#[derive(Debug, Clone)]
pub struct NewEvidence {
    pub evidence_type: EvidenceType,
    pub file_url: String,
    pub description: Option<String>,
}

// ============================================================================
// Payment Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbPayment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub gross_amount: Decimal,
    pub commission_rate: Decimal,
    pub commission_amount: Decimal,
    pub net_provider_amount: Decimal,
    pub refunded_amount: Decimal,
    pub status: String,
    pub idempotency_key: String,
    pub gateway_intent_id: Option<String>,
    pub client_secret: Option<String>,
    pub payment_method_id: Option<String>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbPayment {
    pub fn status(&self) -> DbResult<PaymentStatus> {
        Ok(self.status.parse()?)
    }

    /// Participants as recorded on the payment (user ids)
    pub fn participants(&self) -> Participants {
        Participants {
            client: self.client_id,
            provider: self.provider_id,
        }
    }
}

/// Fields for a new payment row. `client_id` / `provider_id` are user ids.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub booking_id: Uuid,
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub split: CommissionSplit,
    pub idempotency_key: String,
    pub gateway_intent_id: String,
    pub client_secret: Option<String>,
}

// ============================================================================
// Wallet Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbWallet {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub pending_balance: Decimal,
    pub available_balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbWallet {
    pub fn balances(&self) -> Balances {
        Balances::new(self.pending_balance, self.available_balance)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbWalletTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub payment_id: Option<Uuid>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub tx_type: String,
    pub balance_kind: String,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub reference_id: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl DbWalletTransaction {
    pub fn tx_type(&self) -> DbResult<TransactionType> {
        Ok(self.tx_type.parse()?)
    }

    pub fn balance_kind(&self) -> DbResult<BalanceKind> {
        Ok(self.balance_kind.parse()?)
    }
}

/// Fields for a new ledger row
#[derive(Debug, Clone)]
pub struct NewWalletTransaction {
    pub wallet_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub tx_type: TransactionType,
    pub balance_kind: BalanceKind,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub reference_id: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
}

// ============================================================================
// Dispute Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbDisputeAudit {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub resolved_by: Option<Uuid>,
    pub favor: String,
    pub refund_percentage: Decimal,
    pub refund_amount: Decimal,
    pub release_amount: Decimal,
    pub resolution: String,
    pub automatic: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDisputeAudit {
    pub booking_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub resolved_by: Option<Uuid>,
    pub favor: DisputeFavor,
    pub refund_percentage: Decimal,
    pub refund_amount: Decimal,
    pub release_amount: Decimal,
    pub resolution: String,
    pub automatic: bool,
}

// ============================================================================
// Catalog Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbService {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub title: String,
    pub price: Decimal,
    pub pricing_type: String,
    pub duration_minutes: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl DbService {
    pub fn pricing_type(&self) -> PricingType {
        PricingType::from_catalog(&self.pricing_type)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbAvailabilityOverride {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub is_blocked: bool,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}
