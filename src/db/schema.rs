use rusqlite::Connection;

/// Initialize the order store schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Orders. Provider webhooks correlate by id (checkout session metadata)
        -- and by payment_intent_id (refund linkage).
        CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            total_minor INTEGER NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'paid', 'failed', 'refunded')),
            checkout_session_id TEXT,
            payment_intent_id TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_orders_session ON orders(checkout_session_id);
        CREATE INDEX IF NOT EXISTS idx_orders_intent ON orders(payment_intent_id);

        -- Append-only audit trail; exactly one note per applied transition
        CREATE TABLE IF NOT EXISTS order_notes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            note TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_order_notes_order ON order_notes(order_id);
        "#,
    )
}
