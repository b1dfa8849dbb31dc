/**
 * MODELS - Modèle de données inventaire et licences
 *
 * RÔLE : Types partagés par le store, le moteur de conformité et l'API REST.
 * Hosts (snapshots immuables), bases de données, entrées de licence, clusters,
 * catalogue des license types, contrats et alertes.
 *
 * ARCHITECTURE : Les données propres à chaque technologie (ex-"OtherInfo") sont
 * un enum typé `DatabaseExtra` plutôt qu'une map libre.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Technology {
    #[serde(rename = "oracle")]
    Oracle,
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "sqlserver")]
    SqlServer,
}

impl Technology {
    pub const ALL: [Technology; 3] = [Technology::Oracle, Technology::MySql, Technology::SqlServer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Technology::Oracle => "oracle",
            Technology::MySql => "mysql",
            Technology::SqlServer => "sqlserver",
        }
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Technology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oracle" => Ok(Technology::Oracle),
            "mysql" => Ok(Technology::MySql),
            "sqlserver" | "microsoft-sqlserver" => Ok(Technology::SqlServer),
            other => Err(format!("unknown technology '{}'", other)),
        }
    }
}

/// Snapshot d'un host pour un cycle de collecte.
/// Un snapshot plus récent remplace l'ancien, il n'est jamais modifié.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub hostname: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub cpu_model: String,
    #[serde(default)]
    pub cpu_sockets: u32,
    #[serde(default)]
    pub cpu_cores: u32,
    #[serde(default)]
    pub cpu_threads: u32,
    #[serde(default)]
    pub cores_per_socket: u32,
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub databases: Vec<Database>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    /// true pour les snapshots historiques
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseRole {
    Primary,
    #[serde(alias = "secondary", alias = "physical_standby", alias = "logical_standby")]
    Standby,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseStatus {
    Open,
    Mounted,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
    pub db_id: u64,
    pub role: DatabaseRole,
    pub status: DatabaseStatus,
    pub extra: DatabaseExtra,
    #[serde(default)]
    pub licenses: Vec<LicenseEntry>,
}

impl Database {
    pub fn technology(&self) -> Technology {
        self.extra.technology()
    }

    pub fn is_open_primary(&self) -> bool {
        self.role == DatabaseRole::Primary && self.status == DatabaseStatus::Open
    }

    /// Standby ouverte ou montée : candidate à la propagation depuis sa primary
    pub fn is_standby_candidate(&self) -> bool {
        self.role != DatabaseRole::Primary
            && matches!(self.status, DatabaseStatus::Open | DatabaseStatus::Mounted)
    }
}

/// Attributs spécifiques à chaque technologie.
///
/// Clés documentées :
/// - `oracle` : `edition`, `rac`
/// - `mysql` : `edition`
/// - `sqlserver` : `edition`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "technology")]
pub enum DatabaseExtra {
    #[serde(rename = "oracle")]
    Oracle {
        edition: OracleEdition,
        #[serde(default)]
        rac: bool,
    },
    #[serde(rename = "mysql")]
    MySql { edition: MySqlEdition },
    #[serde(rename = "sqlserver")]
    SqlServer { edition: SqlServerEdition },
}

impl DatabaseExtra {
    pub fn technology(&self) -> Technology {
        match self {
            DatabaseExtra::Oracle { .. } => Technology::Oracle,
            DatabaseExtra::MySql { .. } => Technology::MySql,
            DatabaseExtra::SqlServer { .. } => Technology::SqlServer,
        }
    }

    /// Oracle SE/SE2 : la métrique processor se compte en sockets occupés
    pub fn counts_processors_by_socket(&self) -> bool {
        matches!(self, DatabaseExtra::Oracle { edition: OracleEdition::Standard, .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleEdition {
    Enterprise,
    Standard,
    Extreme,
    Express,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MySqlEdition {
    Community,
    Enterprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlServerEdition {
    Enterprise,
    Standard,
    Developer,
    Express,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseEntry {
    #[serde(default)]
    pub license_type_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub count: f64,
    #[serde(default)]
    pub ignored: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignored_comment: Option<String>,
    /// Entrée synthétisée par la propagation primary → standby
    #[serde(default)]
    pub propagated: bool,
}

impl LicenseEntry {
    /// Identifiant de part, avec repli sur le nom quand l'agent n'a pas fourni d'id
    pub fn part_id(&self) -> &str {
        if self.license_type_id.is_empty() {
            &self.name
        } else {
            &self.license_type_id
        }
    }

    pub fn same_license(&self, other: &LicenseEntry) -> bool {
        if !self.license_type_id.is_empty() && !other.license_type_id.is_empty() {
            self.license_type_id == other.license_type_id
        } else {
            self.name == other.name
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    #[serde(default)]
    pub hostnames: Vec<String>,
    /// Capacité CPU agrégée du cluster
    #[serde(default)]
    pub cpu: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseMetric {
    Processor,
    NamedUserPlus,
    PerSocket,
    PerCore,
    Host,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreFactorRule {
    /// Fragment du modèle CPU, comparé sans tenir compte de la casse
    pub processor: String,
    pub factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseType {
    pub id: String,
    #[serde(default)]
    pub item_description: String,
    pub technology: Technology,
    pub metric: LicenseMetric,
    #[serde(default)]
    pub core_factors: Vec<CoreFactorRule>,
    #[serde(default)]
    pub default_core_factor: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub contract_id: String,
    pub technology: Technology,
    pub part_ids: Vec<String>,
    #[serde(default)]
    pub unlimited: bool,
    #[serde(default)]
    pub basket: bool,
    #[serde(default)]
    pub restricted: bool,
    #[serde(default)]
    pub covered_licenses_count: f64,
    /// Hostnames ou noms de cluster associés au contrat
    #[serde(default)]
    pub hosts: Vec<String>,
}

impl Contract {
    pub fn covers_part(&self, part_id: &str) -> bool {
        self.part_ids.iter().any(|p| p == part_id)
    }
}

/// Base de données accompagnée du hostname qui l'héberge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedDatabase {
    pub hostname: String,
    pub database: Database,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertCategory {
    Engine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertCode {
    MissingPrimaryDatabase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    New,
    Ack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertDetail {
    MissingPrimaryDatabase { hostname: String, dbname: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub category: AlertCategory,
    pub code: AlertCode,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub detail: AlertDetail,
}

impl Alert {
    pub fn missing_primary_database(hostname: &str, dbname: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            category: AlertCategory::Engine,
            code: AlertCode::MissingPrimaryDatabase,
            severity: AlertSeverity::Warning,
            status: AlertStatus::New,
            description: format!("Missing primary database on standby database: {}", dbname),
            date: OffsetDateTime::now_utc(),
            detail: AlertDetail::MissingPrimaryDatabase {
                hostname: hostname.to_string(),
                dbname: dbname.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_technology_from_str() {
        assert_eq!("Oracle".parse::<Technology>(), Ok(Technology::Oracle));
        assert_eq!("mysql".parse::<Technology>(), Ok(Technology::MySql));
        assert_eq!("microsoft-sqlserver".parse::<Technology>(), Ok(Technology::SqlServer));
        assert!("postgres".parse::<Technology>().is_err());
    }

    #[test]
    fn test_database_extra_is_tagged_by_technology() {
        let json = r#"{
            "name": "ERCOLE", "db_id": 1, "role": "secondary", "status": "mounted",
            "extra": {"technology": "oracle", "edition": "enterprise"},
            "licenses": [{"license_type_id": "L1", "count": 2.0}]
        }"#;
        let db: Database = serde_json::from_str(json).unwrap();
        assert_eq!(db.technology(), Technology::Oracle);
        assert_eq!(db.role, DatabaseRole::Standby);
        assert!(db.is_standby_candidate());
        assert!(!db.is_open_primary());
        assert_eq!(db.licenses[0].part_id(), "L1");
        assert!(!db.licenses[0].ignored);
    }

    #[test]
    fn test_license_entry_matching_falls_back_to_name() {
        let with_id = LicenseEntry {
            license_type_id: "A90611".into(),
            name: "Enterprise Edition".into(),
            count: 1.0,
            ignored: false,
            ignored_comment: None,
            propagated: false,
        };
        let without_id = LicenseEntry { license_type_id: String::new(), ..with_id.clone() };
        let other_id = LicenseEntry { license_type_id: "A90619".into(), ..with_id.clone() };

        assert!(with_id.same_license(&without_id));
        assert!(!with_id.same_license(&other_id));
        assert_eq!(without_id.part_id(), "Enterprise Edition");
    }

    #[test]
    fn test_missing_primary_alert_payload() {
        let alert = Alert::missing_primary_database("host-b", "ERCOLE");
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["code"], "MISSING_PRIMARY_DATABASE");
        assert_eq!(value["severity"], "WARNING");
        assert_eq!(value["detail"]["kind"], "missing_primary_database");
        assert_eq!(value["detail"]["hostname"], "host-b");
        assert_eq!(value["detail"]["dbname"], "ERCOLE");
    }
}
