// ==========================================
// 批量导入引擎 - 配置管理器
// ==========================================
// 职责: 导入选项档案的加载、保存、快照与恢复
// 存储: config_kv 表 (key-value + scope)
// 键名: import_profile/{name}, scope_id = 'global'
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::config::import_options::ImportOptions;
use crate::db::open_sqlite_connection;
use crate::importer::error::{ConfigError, ConfigResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// 档案键前缀
pub const PROFILE_KEY_PREFIX: &str = "import_profile/";

/// 全局作用域
pub const GLOBAL_SCOPE: &str = "global";

const CREATE_CONFIG_KV_SQL: &str = "CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
)";

fn profile_key(name: &str) -> String {
    format!("{}{}", PROFILE_KEY_PREFIX, name.trim())
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        conn.execute_batch(CREATE_CONFIG_KV_SQL)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等），并确保 config_kv 表存在。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| ConfigError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
            guard.execute_batch(CREATE_CONFIG_KV_SQL)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| ConfigError::ReadError {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        Ok(value)
    }

    /// 保存导入选项档案（已存在则覆盖）
    pub fn save_import_profile(&self, name: &str, options: &ImportOptions) -> ConfigResult<()> {
        let key = profile_key(name);
        let raw = serde_json::to_string(options).map_err(|e| ConfigError::ParseError {
            key: key.clone(),
            message: e.to_string(),
        })?;

        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
            params![GLOBAL_SCOPE, key, raw],
        )?;

        info!(profile = %name, "导入选项档案已保存");
        Ok(())
    }

    /// 删除导入选项档案
    ///
    /// # 返回
    /// - true: 档案存在并已删除
    pub fn delete_import_profile(&self, name: &str) -> ConfigResult<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))?;
        let affected = conn.execute(
            "DELETE FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![GLOBAL_SCOPE, profile_key(name)],
        )?;
        Ok(affected > 0)
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 批量导入前记录配置,便于出错后回滚
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&json!(config_map)).map_err(|e| ConfigError::ParseError {
            key: "snapshot".to_string(),
            message: e.to_string(),
        })
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    ///
    /// # 注意
    /// - 覆盖现有同名 global 配置,快照外的键保持不变
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> ConfigResult<usize> {
        let config_map: BTreeMap<String, String> =
            serde_json::from_str(snapshot_json).map_err(|e| ConfigError::ParseError {
                key: "snapshot".to_string(),
                message: e.to_string(),
            })?;

        let mut conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value",
                params![GLOBAL_SCOPE, key, value],
            )?;
        }
        tx.commit()?;

        debug!(restored = count, "配置快照已恢复");
        Ok(count)
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
impl ImportConfigReader for ConfigManager {
    fn get_import_profile(&self, name: &str) -> ConfigResult<Option<ImportOptions>> {
        if name.trim().is_empty() {
            return Ok(None);
        }

        let key = profile_key(name);
        let raw = match self.get_config_value(&key)? {
            Some(v) => v,
            None => return Ok(None),
        };

        let options: ImportOptions =
            serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError {
                key,
                message: e.to_string(),
            })?;
        Ok(Some(options))
    }

    fn list_import_profiles(&self) -> ConfigResult<Vec<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT key FROM config_kv WHERE scope_id = ?1 AND key LIKE ?2 ORDER BY key",
        )?;
        let rows = stmt.query_map(
            params![GLOBAL_SCOPE, format!("{}%", PROFILE_KEY_PREFIX)],
            |row| row.get::<_, String>(0),
        )?;

        let mut names = Vec::new();
        for row in rows {
            let key = row?;
            names.push(key.trim_start_matches(PROFILE_KEY_PREFIX).to_string());
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::import_options::DuplicateKeyUpdate;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_missing_profile_falls_back_to_default() {
        let manager = manager();
        assert!(manager.get_import_profile("nope").unwrap().is_none());
        let options = manager.get_import_profile_or_default("nope").unwrap();
        assert!(options.validate);
        assert!(options.timestamps);
        assert!(matches!(
            manager.require_import_profile("nope"),
            Err(ConfigError::NotFound(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_save_and_load_profile() {
        let manager = manager();
        let options = ImportOptions {
            on_duplicate_key_update: Some(DuplicateKeyUpdate::All),
            batch_size: Some(500),
            ..Default::default()
        };
        manager.save_import_profile("upsert_all", &options).unwrap();

        let loaded = manager.get_import_profile("upsert_all").unwrap().unwrap();
        assert_eq!(loaded, options);
        assert_eq!(manager.list_import_profiles().unwrap(), vec!["upsert_all"]);

        assert!(manager.delete_import_profile("upsert_all").unwrap());
        assert!(manager.list_import_profiles().unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_and_restore() {
        let manager = manager();
        manager
            .save_import_profile("a", &ImportOptions::default())
            .unwrap();
        let snapshot = manager.get_config_snapshot().unwrap();

        manager.delete_import_profile("a").unwrap();
        let restored = manager.restore_config_from_snapshot(&snapshot).unwrap();
        assert_eq!(restored, 1);
        assert!(manager.get_import_profile("a").unwrap().is_some());
    }

    #[test]
    fn test_corrupt_profile_reports_parse_error() {
        let manager = manager();
        {
            let conn = manager.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', 'import_profile/bad', '{not json')",
                [],
            )
            .unwrap();
        }
        let err = manager.get_import_profile("bad").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}
