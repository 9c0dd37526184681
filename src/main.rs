// ==========================================
// 批量导入引擎 - 命令行入口
// ==========================================
// 用法: bulk-import <db_path> <table> <csv_path> [profile]
// 流程: 读取表结构 → 解析 CSV → 按档案选项批量导入 → 输出汇总
// ==========================================

use anyhow::{bail, Context, Result};
use bulk_import::config::{ConfigManager, ImportConfigReader};
use bulk_import::domain::{DynamicRecord, Model, ModelSchema, Value};
use bulk_import::importer::{BulkImporter, ImportInput};
use bulk_import::{logging, Adapter, SqliteAdapter};

fn main() -> Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        bail!("用法: bulk-import <db_path> <table> <csv_path> [profile]");
    }
    let (db_path, table, csv_path) = (&args[0], &args[1], &args[2]);
    let profile = args.get(3);

    tracing::info!("==================================================");
    tracing::info!("批量导入引擎 v{}", bulk_import::VERSION);
    tracing::info!("数据库: {}, 表: {}, 文件: {}", db_path, table, csv_path);
    tracing::info!("==================================================");

    let adapter = SqliteAdapter::open(db_path).context("打开数据库失败")?;
    let schema = adapter
        .load_schema(table)
        .with_context(|| format!("读取表结构失败: {}", table))?;

    let options = match profile {
        Some(name) => {
            let config = ConfigManager::new(db_path).context("初始化配置管理器失败")?;
            config.require_import_profile(name)?
        }
        None => Default::default(),
    };

    let (columns, rows) = read_csv(csv_path, &schema)?;
    tracing::info!(rows = rows.len(), columns = columns.len(), "CSV 解析完成");

    let importer = BulkImporter::new(&adapter);
    let result = importer.import(&schema, ImportInput::<DynamicRecord>::raw(columns, rows), &options)?;

    println!("表: {} ({})", schema.table_name, adapter.adapter_name());
    println!("插入行数: {}", result.num_inserts);
    println!("校验失败: {}", result.failed_count());
    for failed in &result.failed_instances {
        println!("  - {}", failed.errors());
    }
    if !result.ids.is_empty() {
        println!("生成主键: {}", result.ids.len());
    }

    Ok(())
}

/// 解析 CSV: 表头为列清单,单元格按列类型转换,空单元格为 NULL
fn read_csv(path: &str, schema: &ModelSchema) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("打开 CSV 失败: {}", path))?;

    let columns: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    let column_types: Vec<_> = columns
        .iter()
        .map(|c| schema.column(c).map(|def| def.column_type))
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("CSV 第 {} 行解析失败", line + 2))?;
        let row = record
            .iter()
            .zip(column_types.iter())
            .map(|(cell, column_type)| {
                if cell.is_empty() {
                    return Value::Null;
                }
                let value = Value::from(cell);
                match column_type {
                    Some(t) => value.coerce_to(*t),
                    None => value,
                }
            })
            .collect();
        rows.push(row);
    }

    Ok((columns, rows))
}
