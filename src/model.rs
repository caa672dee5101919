use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::format::{format_bytes, format_speed};

/// Status value the backend uses for a usable response
pub const STATUS_SUCCESS: &str = "success";

/// Number of columns in the rendered table and in every CSV row
pub const COLUMN_COUNT: usize = 6;

/// Router to query, as submitted by the user.
///
/// The backend expects the credentials in the clear inside the JSON request
/// body, so they are only as protected as the transport to the backend. Use
/// an `https` base URL whenever the backend is not on the loopback interface.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorTarget {
    #[serde(alias = "ip")]
    pub address: String,
    pub username: String,
    pub password: SecretString,
    #[serde(default)]
    pub interfaces: Vec<String>,
}

/// Body of `POST /api/get-stats`
#[derive(Debug, Serialize)]
pub struct StatsRequest<'a> {
    pub ip: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub interfaces: &'a [String],
}

impl<'a> From<&'a MonitorTarget> for StatsRequest<'a> {
    fn from(target: &'a MonitorTarget) -> Self {
        Self {
            ip: &target.address,
            username: &target.username,
            password: target.password.expose_secret(),
            interfaces: &target.interfaces,
        }
    }
}

/// Response of `POST /api/get-stats`. Neither field is guaranteed to be
/// present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub stats: Option<StatsCollection>,
}

impl StatsResponse {
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some(STATUS_SUCCESS)
    }

    /// Status as shown in logs, `<missing>` when absent
    pub fn status_label(&self) -> &str {
        self.status.as_deref().unwrap_or("<missing>")
    }

    /// Table rows in column order
    pub fn rows(&self) -> Vec<[String; COLUMN_COUNT]> {
        self.stats
            .as_ref()
            .map(StatsCollection::rows)
            .unwrap_or_default()
    }
}

/// Per-interface records, either as a list or keyed by interface name.
/// Both keep the order the backend sent.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StatsCollection {
    List(Vec<InterfaceRecord>),
    Keyed(IndexMap<String, InterfaceRecord>),
}

impl StatsCollection {
    pub(crate) fn len(&self) -> usize {
        match self {
            StatsCollection::List(records) => records.len(),
            StatsCollection::Keyed(records) => records.len(),
        }
    }

    pub fn rows(&self) -> Vec<[String; COLUMN_COUNT]> {
        match self {
            StatsCollection::List(records) => records.iter().map(|r| r.to_row(None)).collect(),
            StatsCollection::Keyed(records) => records
                .iter()
                .map(|(name, r)| r.to_row(Some(name.as_str())))
                .collect(),
        }
    }
}

/// One interface as reported by the backend. Field values are taken as they
/// come; strings are shown verbatim, numbers are formatted per column.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterfaceRecord {
    #[serde(default, alias = "interface", alias = "name")]
    pub iface: Value,
    #[serde(default, alias = "rx_speed")]
    pub down: Value,
    #[serde(default, alias = "tx_speed")]
    pub up: Value,
    #[serde(default, alias = "rx_total")]
    pub rx: Value,
    #[serde(default, alias = "tx_total")]
    pub tx: Value,
    #[serde(default, alias = "timestamp")]
    pub time: Value,
}

impl InterfaceRecord {
    fn to_row(&self, key: Option<&str>) -> [String; COLUMN_COUNT] {
        let iface = match (&self.iface, key) {
            (Value::Null, Some(key)) => key.to_string(),
            (value, _) => cell_text(value, plain),
        };

        [
            iface,
            cell_text(&self.down, speed),
            cell_text(&self.up, speed),
            cell_text(&self.rx, bytes),
            cell_text(&self.tx, bytes),
            cell_text(&self.time, plain),
        ]
    }
}

fn plain(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn speed(n: f64) -> String {
    format_speed(n)
}

fn bytes(n: f64) -> String {
    format_bytes(n)
}

fn cell_text(value: &Value, number: fn(f64) -> String) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.as_f64().map(number).unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_response() {
        let response: StatsResponse = serde_json::from_value(json!({
            "status": "success",
            "stats": [
                {"iface": "ether1", "down": "10Mbps", "up": "2Mbps", "rx": "500MB", "tx": "100MB", "time": "12:00"}
            ]
        }))
        .unwrap();

        assert!(response.is_success());
        assert_eq!(
            response.rows(),
            vec![["ether1", "10Mbps", "2Mbps", "500MB", "100MB", "12:00"].map(String::from)]
        );
    }

    #[test]
    fn test_keyed_response_uses_backend_names() {
        // Parsed from text: `json!` would reorder the keys
        let response: StatsResponse = serde_json::from_str(
            r#"{
                "status": "success",
                "stats": {
                    "wlan1": {"rx_speed": "1.00 Mbps", "tx_speed": "0 bps", "rx_total": "1.00 KB", "tx_total": "2.00 KB", "timestamp": "10:00:01"},
                    "ether1": {"rx_speed": "5.00 Mbps", "tx_speed": "1.00 Mbps", "rx_total": "3.00 GB", "tx_total": "1.00 GB", "timestamp": "10:00:01"}
                }
            }"#,
        )
        .unwrap();

        let rows = response.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "wlan1");
        assert_eq!(rows[0][5], "10:00:01");
        assert_eq!(rows[1][0], "ether1");
        assert_eq!(rows[1][1], "5.00 Mbps");
    }

    #[test]
    fn test_keyed_rows_keep_submitted_order() {
        let response: StatsResponse = serde_json::from_str(
            r#"{"status": "success", "stats": {"sfp1": {}, "ether10": {}, "bridge": {}, "ether2": {}}}"#,
        )
        .unwrap();

        let names: Vec<String> = response.rows().into_iter().map(|row| row[0].clone()).collect();
        assert_eq!(names, vec!["sfp1", "ether10", "bridge", "ether2"]);
    }

    #[test]
    fn test_numeric_values_are_formatted() {
        let response: StatsResponse = serde_json::from_value(json!({
            "status": "success",
            "stats": [{"iface": "ether2", "down": 2_500_000, "up": 800, "rx": 2048, "tx": 0, "time": 1700000000}]
        }))
        .unwrap();

        assert_eq!(
            response.rows()[0],
            ["ether2", "2.50 Mbps", "800 bps", "2.00 KB", "0.00 B", "1700000000"].map(String::from)
        );
    }

    #[test]
    fn test_missing_fields() {
        let response: StatsResponse = serde_json::from_value(json!({})).unwrap();
        assert!(!response.is_success());
        assert_eq!(response.status_label(), "<missing>");
        assert!(response.rows().is_empty());

        let response: StatsResponse =
            serde_json::from_value(json!({"status": "success", "stats": [{"iface": "ether1"}]}))
                .unwrap();
        assert_eq!(response.rows()[0], ["ether1", "", "", "", "", ""].map(String::from));
    }

    #[test]
    fn test_request_body() {
        let target = MonitorTarget {
            address: "192.168.88.1".to_string(),
            username: "admin".to_string(),
            password: SecretString::from("secret".to_string()),
            interfaces: vec!["ether1".to_string()],
        };

        let body = serde_json::to_value(StatsRequest::from(&target)).unwrap();
        assert_eq!(
            body,
            json!({"ip": "192.168.88.1", "username": "admin", "password": "secret", "interfaces": ["ether1"]})
        );
        assert!(!format!("{:?}", target).contains("secret"));
    }
}
