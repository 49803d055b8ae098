//! SQLite-backed reference store.

use std::collections::HashMap;

use rusqlite::{params, params_from_iter, Connection, ToSql};

use super::{
    IdentifierField, ItemReference, LotKey, MaterialTransaction, ReferenceData, ReferenceStore,
    TransactionType,
};
use crate::error::Result;

/// Bound parameters per statement; keeps IN lists well under SQLite's limit.
const CHUNK_SIZE: usize = 400;

const TXN_COLUMNS: &str =
    "batch_id, txn_type, item_code, lot_number, parent_lot_number, supplier_lot_number";

/// Reference store over a borrowed SQLite connection.
///
/// Borrowing keeps the store tied to one request's connection; nothing is
/// cached between calls.
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn query_transactions(
        &self,
        sql: &str,
        params: Vec<Box<dyn ToSql>>,
    ) -> Result<Vec<MaterialTransaction>> {
        let mut stmt = self.conn.prepare(sql)?;
        let raw = stmt
            .query_map(params_from_iter(params), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        raw.into_iter()
            .map(|(batch_id, txn_type, item_code, lot, parent_lot, supplier_lot)| {
                Ok(MaterialTransaction {
                    batch_id,
                    txn_type: txn_type.parse()?,
                    item_code,
                    lot,
                    parent_lot,
                    supplier_lot,
                })
            })
            .collect()
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

impl ReferenceStore for SqliteStore<'_> {
    fn find_by_identifier(
        &self,
        txn_type: TransactionType,
        field: IdentifierField,
        values: &[String],
    ) -> Result<Vec<MaterialTransaction>> {
        let mut out = Vec::new();
        for chunk in values.chunks(CHUNK_SIZE) {
            let sql = format!(
                "SELECT DISTINCT {} FROM material_transactions \
                 WHERE txn_type = ? AND {} IN ({})",
                TXN_COLUMNS,
                field.column(),
                placeholders(chunk.len())
            );
            let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(txn_type.as_str())];
            for v in chunk {
                params.push(Box::new(v.clone()));
            }
            out.extend(self.query_transactions(&sql, params)?);
        }
        Ok(out)
    }

    fn batch_transactions(&self, batch_ids: &[String]) -> Result<Vec<MaterialTransaction>> {
        let mut out = Vec::new();
        for chunk in batch_ids.chunks(CHUNK_SIZE) {
            let sql = format!(
                "SELECT DISTINCT {} FROM material_transactions WHERE batch_id IN ({})",
                TXN_COLUMNS,
                placeholders(chunk.len())
            );
            let params: Vec<Box<dyn ToSql>> = chunk
                .iter()
                .map(|id| Box::new(id.clone()) as Box<dyn ToSql>)
                .collect();
            out.extend(self.query_transactions(&sql, params)?);
        }
        Ok(out)
    }

    fn transactions_for_lots(
        &self,
        txn_type: TransactionType,
        lots: &[LotKey],
    ) -> Result<Vec<MaterialTransaction>> {
        let mut out = Vec::new();
        // Two parameters per lot
        for chunk in lots.chunks(CHUNK_SIZE / 2) {
            let pairs = vec!["(?, ?)"; chunk.len()].join(",");
            let sql = format!(
                "SELECT DISTINCT {} FROM material_transactions \
                 WHERE txn_type = ? AND (item_code, lot_number) IN (VALUES {})",
                TXN_COLUMNS, pairs
            );
            let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(txn_type.as_str())];
            for key in chunk {
                params.push(Box::new(key.item_code.clone()));
                params.push(Box::new(key.lot.clone()));
            }
            out.extend(self.query_transactions(&sql, params)?);
        }
        Ok(out)
    }

    fn item_references(&self, item_codes: &[String]) -> Result<HashMap<String, ItemReference>> {
        let mut out = HashMap::new();
        for chunk in item_codes.chunks(CHUNK_SIZE) {
            let sql = format!(
                "SELECT item_code, product_code, category, description, unit_op_name \
                 FROM item_master WHERE item_code IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok(ItemReference {
                    item_code: row.get(0)?,
                    product_code: row.get(1)?,
                    category: row.get(2)?,
                    description: row.get(3)?,
                    unit_op_name: row.get(4)?,
                })
            })?;
            for row in rows {
                let item = row?;
                out.insert(item.item_code.clone(), item);
            }
        }
        Ok(out)
    }

    fn search_item_codes(&self, text: &str, limit: usize) -> Result<Vec<String>> {
        let escaped = text.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        let pattern = format!("%{}%", escaped);
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT item_code FROM material_transactions \
             WHERE item_code LIKE ?1 ESCAPE '\\' \
             ORDER BY item_code LIMIT ?2",
        )?;
        let codes = stmt
            .query_map(params![pattern, limit as i64], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
        Ok(codes)
    }

    fn product_codes(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT product_code FROM item_master \
             WHERE product_code IS NOT NULL ORDER BY product_code",
        )?;
        let codes = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
        Ok(codes)
    }
}

/// Write a reference dataset into a migrated database.
///
/// Development tooling for the `load` binary; the lineage engine never calls
/// this. With `replace`, existing rows are removed first. Returns the number
/// of transactions and items written.
pub fn write_reference_data(
    conn: &mut Connection,
    data: &ReferenceData,
    replace: bool,
) -> Result<(usize, usize)> {
    let tx = conn.transaction()?;

    if replace {
        tx.execute("DELETE FROM material_transactions", [])?;
        tx.execute("DELETE FROM item_master", [])?;
    }

    {
        let mut insert_txn = tx.prepare(
            "INSERT INTO material_transactions \
             (batch_id, txn_type, item_code, lot_number, parent_lot_number, supplier_lot_number) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for t in &data.transactions {
            insert_txn.execute(params![
                t.batch_id,
                t.txn_type.as_str(),
                t.item_code,
                t.lot,
                t.parent_lot,
                t.supplier_lot,
            ])?;
        }

        let mut insert_item = tx.prepare(
            "INSERT INTO item_master (item_code, product_code, category, description, unit_op_name) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(item_code) DO UPDATE SET \
                product_code = excluded.product_code, \
                category = excluded.category, \
                description = excluded.description, \
                unit_op_name = excluded.unit_op_name",
        )?;
        for item in &data.items {
            insert_item.execute(params![
                item.item_code,
                item.product_code,
                item.category,
                item.description,
                item.unit_op_name,
            ])?;
        }
    }

    tx.commit()?;

    log::debug!(
        "Wrote {} transactions and {} items",
        data.transactions.len(),
        data.items.len()
    );
    Ok((data.transactions.len(), data.items.len()))
}
