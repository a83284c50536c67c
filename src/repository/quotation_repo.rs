// ==========================================
// 采购阶段跟踪系统 - 报价来源数据仓储
// ==========================================
// 表: quotation / quotation_line (报价模块维护)
// 本系统读取: 报价行 + 选定价格
// 本系统写入: 报价单汇总审批标志
// ==========================================

use crate::domain::quotation::{OriginatingLine, PriceInfo, QuotationApprovalFlags};
use crate::domain::types::PurchaseVariant;
use crate::repository::columns::{fmt_date, get_opt_date};
use crate::repository::error::{conversion_error, RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const SELECT_LINE: &str = r#"
    SELECT l.line_id, l.quotation_id, q.project_id, l.sku, l.description, l.quantity,
           l.origin_country, l.transport_mode, q.purchase_type, q.quote_date,
           l.price_selected, l.supplier_name, l.unit_price, l.total_price, l.discount_price
    FROM quotation_line l
    JOIN quotation q ON q.quotation_id = l.quotation_id
"#;

// ==========================================
// QuotationRepository - 报价来源仓储
// ==========================================
pub struct QuotationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl QuotationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 读取
    // ==========================================

    /// 按报价行ID查询来源行
    pub fn find_line(&self, line_id: &str) -> RepositoryResult<Option<OriginatingLine>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            &format!("{} WHERE l.line_id = ?", SELECT_LINE),
            params![line_id],
            Self::map_line_row,
        );
        match result {
            Ok(line) => Ok(Some(line)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 已批准报价单中已选定价格的报价行 (批量同步输入)
    pub fn list_selected_lines_of_approved(&self) -> RepositoryResult<Vec<OriginatingLine>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE q.approved = 1 AND l.price_selected = 1 ORDER BY l.quotation_id, l.line_id",
            SELECT_LINE
        ))?;
        let lines = stmt
            .query_map([], Self::map_line_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(lines)
    }

    /// 查询报价单汇总审批标志
    pub fn find_approval_flags(&self, quotation_id: &str) -> RepositoryResult<Option<QuotationApprovalFlags>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            "SELECT all_items_approved, partially_approved FROM quotation WHERE quotation_id = ?",
            params![quotation_id],
            |row| {
                Ok(QuotationApprovalFlags {
                    all_items_approved: row.get(0)?,
                    partially_approved: row.get(1)?,
                })
            },
        );
        match result {
            Ok(flags) => Ok(Some(flags)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 回写报价单汇总审批标志
    pub fn update_approval_flags(
        &self,
        quotation_id: &str,
        flags: QuotationApprovalFlags,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE quotation SET all_items_approved = ?, partially_approved = ? WHERE quotation_id = ?",
            params![flags.all_items_approved, flags.partially_approved, quotation_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Quotation".to_string(),
                id: quotation_id.to_string(),
            });
        }
        Ok(())
    }

    /// 写入报价单头 (独立部署/测试数据准备)
    pub fn upsert_quotation(
        &self,
        quotation_id: &str,
        project_id: Option<&str>,
        variant: PurchaseVariant,
        quote_date: Option<NaiveDate>,
        approved: bool,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO quotation (quotation_id, project_id, purchase_type, quote_date, approved)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(quotation_id) DO UPDATE SET
                project_id = excluded.project_id,
                purchase_type = excluded.purchase_type,
                quote_date = excluded.quote_date,
                approved = excluded.approved
            "#,
            params![
                quotation_id,
                project_id,
                variant.to_db_str(),
                quote_date.as_ref().map(fmt_date),
                approved,
            ],
        )?;
        Ok(())
    }

    /// 写入报价行 (独立部署/测试数据准备)
    pub fn upsert_line(&self, line: &OriginatingLine) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let price = line.selected_price.as_ref();
        conn.execute(
            r#"
            INSERT INTO quotation_line (
                line_id, quotation_id, sku, description, quantity, origin_country,
                transport_mode, supplier_name, unit_price, total_price, discount_price,
                price_selected
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(line_id) DO UPDATE SET
                sku = excluded.sku,
                description = excluded.description,
                quantity = excluded.quantity,
                origin_country = excluded.origin_country,
                transport_mode = excluded.transport_mode,
                supplier_name = excluded.supplier_name,
                unit_price = excluded.unit_price,
                total_price = excluded.total_price,
                discount_price = excluded.discount_price,
                price_selected = excluded.price_selected
            "#,
            params![
                line.line_id,
                line.quotation_id,
                line.sku,
                line.description,
                line.quantity,
                line.origin_country,
                line.transport_mode,
                price.map(|p| p.supplier_name.clone()),
                price.map(|p| p.unit_price),
                price.map(|p| p.total_price),
                price.and_then(|p| p.discount_price),
                price.is_some(),
            ],
        )?;
        Ok(())
    }

    // ==========================================
    // 行映射
    // ==========================================

    fn map_line_row(row: &Row) -> SqliteResult<OriginatingLine> {
        let variant_str: String = row.get(8)?;
        let variant = PurchaseVariant::from_str(&variant_str)
            .ok_or_else(|| conversion_error(8, format!("未知采购类型: {}", variant_str)))?;

        let price_selected: bool = row.get(10)?;
        let supplier: Option<String> = row.get(11)?;
        let unit_price: Option<f64> = row.get(12)?;
        let total_price: Option<f64> = row.get(13)?;

        // 未选定或价格不完整 → 视为无选定价格
        let selected_price = match (price_selected, supplier, unit_price, total_price) {
            (true, Some(supplier_name), Some(unit_price), Some(total_price)) => Some(PriceInfo {
                supplier_name,
                unit_price,
                total_price,
                discount_price: row.get(14)?,
            }),
            _ => None,
        };

        Ok(OriginatingLine {
            line_id: row.get(0)?,
            quotation_id: row.get(1)?,
            project_id: row.get(2)?,
            sku: row.get(3)?,
            description: row.get(4)?,
            quantity: row.get(5)?,
            origin_country: row.get(6)?,
            transport_mode: row.get(7)?,
            variant,
            quote_date: get_opt_date(row, 9)?,
            selected_price,
        })
    }
}
