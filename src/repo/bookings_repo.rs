use crate::domain::booking::{BankAccount, Booking, BookingPaymentStatus, Party, PaymentMethodCode};
use crate::domain::payment::PaymentProof;
use crate::domain::ports::{ApprovalOutcome, BookingStore};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct BookingsRepo {
    pub pool: PgPool,
}

fn parse_method(raw: Option<String>) -> Option<PaymentMethodCode> {
    match raw.as_deref() {
        Some("payphone") => Some(PaymentMethodCode::Payphone),
        Some("bank_transfer") => Some(PaymentMethodCode::BankTransfer),
        _ => None,
    }
}

fn booking_from_row(r: &PgRow) -> Result<Booking> {
    let status: String = r.get("payment_status");
    Ok(Booking {
        id: r.get("id"),
        customer: Party {
            user_id: r.get("customer_id"),
            name: r.get("customer_name"),
            email: r.get("customer_email"),
            phone: r.get("customer_phone"),
        },
        provider: Party {
            user_id: r.get("provider_id"),
            name: r.get("provider_name"),
            email: r.get("provider_email"),
            phone: r.get("provider_phone"),
        },
        service_name: r.get("service_name"),
        scheduled_at: r.get("scheduled_at"),
        total_cost: r.get("total_cost"),
        payment_status: BookingPaymentStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown payment status {}", status))?,
        payment_method: parse_method(r.get("payment_method")),
    })
}

#[async_trait]
impl BookingStore for BookingsRepo {
    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query(
            r#"
            SELECT b.id, b.service_name, b.scheduled_at, b.total_cost, b.payment_status, b.payment_method,
                   c.id AS customer_id, c.full_name AS customer_name, c.email AS customer_email, c.phone AS customer_phone,
                   p.id AS provider_id, p.full_name AS provider_name, p.email AS provider_email, p.phone AS provider_phone
            FROM bookings b
            JOIN users c ON c.id = b.customer_id
            JOIN users p ON p.id = b.provider_id
            WHERE b.id = $1
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(booking_from_row).transpose()
    }

    async fn list_bank_accounts(&self) -> Result<Vec<BankAccount>> {
        let rows = sqlx::query(
            r#"
            SELECT id, bank_name, account_type, account_number, holder_name
            FROM bank_accounts
            WHERE is_active = TRUE
            ORDER BY display_order, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| BankAccount {
                id: r.get("id"),
                bank_name: r.get("bank_name"),
                account_type: r.get("account_type"),
                account_number: r.get("account_number"),
                holder_name: r.get("holder_name"),
            })
            .collect())
    }

    async fn transition(
        &self,
        booking_id: Uuid,
        from: BookingPaymentStatus,
        to: BookingPaymentStatus,
        method: Option<PaymentMethodCode>,
    ) -> Result<bool> {
        if !from.can_transition_to(to) {
            return Err(anyhow!("illegal payment status transition {} -> {}", from, to));
        }
        let res = sqlx::query(
            r#"
            UPDATE bookings
            SET payment_status = $3,
                payment_method = COALESCE($4, payment_method),
                updated_at = NOW()
            WHERE id = $1 AND payment_status = $2
            "#,
        )
        .bind(booking_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(method.map(|m| m.as_str()))
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn record_intent(&self, booking_id: Uuid, vendor_transaction_id: &str, amount: Decimal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, booking_id, vendor_transaction_id, method, amount, status)
            VALUES ($1, $2, $3, 'payphone', $4, 'initiated')
            ON CONFLICT (booking_id, vendor_transaction_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(booking_id)
        .bind(vendor_transaction_id)
        .bind(amount)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_approval(
        &self,
        booking_id: Uuid,
        vendor_transaction_id: &str,
        amount: Decimal,
        method: PaymentMethodCode,
    ) -> Result<ApprovalOutcome> {
        let mut tx = self.pool.begin().await?;

        // Locks the booking row, so concurrent approvals of the same booking
        // run one after the other and only the first sees a payable status.
        let moved = sqlx::query(
            r#"
            UPDATE bookings
            SET payment_status = 'approved', payment_method = $2, updated_at = NOW()
            WHERE id = $1 AND payment_status IN ('awaiting_confirmation', 'proof_submitted')
            "#,
        )
        .bind(booking_id)
        .bind(method.as_str())
        .execute(&mut *tx)
        .await?;
        if moved.rows_affected() == 0 {
            let row = sqlx::query("SELECT payment_status FROM bookings WHERE id = $1")
                .bind(booking_id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;
            let Some(row) = row else {
                return Err(anyhow!("booking {} not found", booking_id));
            };
            let status: String = row.get("payment_status");
            return match BookingPaymentStatus::parse(&status) {
                Some(BookingPaymentStatus::Approved) => Ok(ApprovalOutcome::AlreadyCredited),
                Some(other) => Ok(ApprovalOutcome::NotPayable(other)),
                None => Err(anyhow!("unknown payment status {}", status)),
            };
        }

        let credited = sqlx::query(
            r#"
            INSERT INTO payments (id, booking_id, vendor_transaction_id, method, amount, status, approved_at)
            VALUES ($1, $2, $3, $4, $5, 'approved', NOW())
            ON CONFLICT (booking_id, vendor_transaction_id)
            DO UPDATE SET status = 'approved', approved_at = NOW()
            WHERE payments.status <> 'approved'
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(booking_id)
        .bind(vendor_transaction_id)
        .bind(method.as_str())
        .bind(amount)
        .execute(&mut *tx)
        .await?;
        if credited.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(ApprovalOutcome::AlreadyCredited);
        }

        tx.commit().await?;
        Ok(ApprovalOutcome::Credited)
    }

    async fn save_proof(&self, proof: &PaymentProof) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO payment_proofs (
                booking_id, reference_number, transfer_date, receipt_name, receipt_content_type,
                receipt, notes, submitted_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(proof.booking_id)
        .bind(&proof.reference_number)
        .bind(proof.transfer_date)
        .bind(proof.receipt.as_ref().map(|r| r.file_name.clone()))
        .bind(proof.receipt.as_ref().map(|r| r.content_type.clone()))
        .bind(proof.receipt.as_ref().map(|r| r.bytes.clone()))
        .bind(&proof.notes)
        .bind(proof.submitted_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("id"))
    }
}
