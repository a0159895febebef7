use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::models::{Order, OrderNote, OrderStatus};

fn now() -> i64 {
    Utc::now().timestamp()
}

const ORDER_COLS: &str =
    "id, total_minor, currency, status, checkout_session_id, payment_intent_id, created_at, updated_at";

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    let status: String = row.get(3)?;
    let status = OrderStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown order status: {}", status).into(),
        )
    })?;

    Ok(Order {
        id: row.get(0)?,
        total_minor: row.get(1)?,
        currency: row.get(2)?,
        status,
        checkout_session_id: row.get(4)?,
        payment_intent_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub fn create_order(conn: &Connection, total_minor: i64, currency: &str) -> Result<Order> {
    let now = now();

    conn.execute(
        "INSERT INTO orders (total_minor, currency, status, created_at, updated_at)
         VALUES (?1, ?2, 'pending', ?3, ?3)",
        params![total_minor, currency, now],
    )?;

    Ok(Order {
        id: conn.last_insert_rowid(),
        total_minor,
        currency: currency.to_string(),
        status: OrderStatus::Pending,
        checkout_session_id: None,
        payment_intent_id: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_order(conn: &Connection, id: i64) -> Result<Option<Order>> {
    let order = conn
        .query_row(
            &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLS),
            params![id],
            order_from_row,
        )
        .optional()?;
    Ok(order)
}

/// Record the hosted checkout session created for an order.
pub fn set_checkout_session(conn: &Connection, id: i64, session_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE orders SET checkout_session_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![session_id, now(), id],
    )?;
    Ok(())
}

/// Transition pending -> paid and record the payment reference.
/// Compare-and-set on status: the race loser affects zero rows.
pub fn try_mark_paid(conn: &Connection, id: i64, payment_intent: Option<&str>) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET status = 'paid', payment_intent_id = ?1, updated_at = ?2
         WHERE id = ?3 AND status = 'pending'",
        params![payment_intent, now(), id],
    )?;
    Ok(affected > 0)
}

/// Transition pending|paid -> refunded. `refunded` is unreachable from
/// `failed`, which the status guard enforces at the store level too.
pub fn try_mark_refunded(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET status = 'refunded', updated_at = ?1
         WHERE id = ?2 AND status IN ('pending', 'paid')",
        params![now(), id],
    )?;
    Ok(affected > 0)
}

/// Transition pending -> failed. A paid order never regresses to failed.
pub fn try_mark_failed(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET status = 'failed', updated_at = ?1
         WHERE id = ?2 AND status = 'pending'",
        params![now(), id],
    )?;
    Ok(affected > 0)
}

pub fn append_order_note(conn: &Connection, order_id: i64, note: &str) -> Result<OrderNote> {
    let now = now();

    conn.execute(
        "INSERT INTO order_notes (order_id, note, created_at) VALUES (?1, ?2, ?3)",
        params![order_id, note, now],
    )?;

    Ok(OrderNote {
        id: conn.last_insert_rowid(),
        order_id,
        note: note.to_string(),
        created_at: now,
    })
}

pub fn list_order_notes(conn: &Connection, order_id: i64) -> Result<Vec<OrderNote>> {
    let mut stmt = conn.prepare(
        "SELECT id, order_id, note, created_at FROM order_notes
         WHERE order_id = ?1 ORDER BY id",
    )?;
    let notes = stmt
        .query_map(params![order_id], |row| {
            Ok(OrderNote {
                id: row.get(0)?,
                order_id: row.get(1)?,
                note: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(notes)
}

pub fn count_order_notes(conn: &Connection, order_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM order_notes WHERE order_id = ?1",
        params![order_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
