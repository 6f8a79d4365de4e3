//! `mstpctl showportdetail <bridge> json` output and its metric mapping.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use serde::Deserialize;

use crate::metric::{MetricDescriptor, Sample, bool_to_f64};

/// Prefix of every spanning-tree metric name.
pub const PREFIX: &str = "mstpd_";

/// Labels identifying one bridge port.
pub const PORT_LABELS: [&str; 2] = ["bridge_name", "interface"];

/// Parsed output: bridge name to port name to details.
pub type ShowPortDetail = BTreeMap<String, BTreeMap<String, PortDetails>>;

/// Spanning-tree state of one bridge port.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortDetails {
    pub bridge_name: String,
    pub port_name: String,
    pub enabled: bool,
    pub role: String,
    pub state: String,
    pub ext_port_cost: f64,
    pub admin_ext_port_cost: f64,
    pub int_port_cost: f64,
    pub admin_int_port_cost: f64,
    pub dsgn_root: String,
    pub dsgn_ext_cost: f64,
    pub dsgn_reg_root: String,
    pub dsgn_int_cost: f64,
    pub dsgn_br: String,
    pub dsgn_port: String,
    pub admin_edge_port: bool,
    pub auto_edge_port: bool,
    pub oper_edge_port: bool,
    pub point_to_point: bool,
    pub admin_point_to_point: String,
    pub port_hello_time: f64,
    pub bpdu_guard_port: bool,
    pub num_tx_bpdu: f64,
    pub num_tx_tcn: f64,
    pub num_rx_bpdu: f64,
    pub num_rx_tcn: f64,
    pub num_trans_fwd: f64,
    pub num_trans_blk: f64,
    pub bpdu_filter_port: bool,
    pub clag_role: String,
    pub clag_dual_conn_mac: String,
    #[serde(rename = "clagRemotePortId")]
    pub clag_remote_port_id: String,
    pub clag_system_mac: String,
}

/// Every spanning-tree descriptor, created once per process.
#[derive(Debug)]
pub struct MstpdMetrics {
    pub enabled: Arc<MetricDescriptor>,
    pub role_info: Arc<MetricDescriptor>,
    pub state_info: Arc<MetricDescriptor>,
    pub ext_port_cost: Arc<MetricDescriptor>,
    pub admin_ext_port_cost: Arc<MetricDescriptor>,
    pub int_port_cost: Arc<MetricDescriptor>,
    pub admin_int_port_cost: Arc<MetricDescriptor>,
    pub dsgn_ext_cost: Arc<MetricDescriptor>,
    pub dsgn_int_cost: Arc<MetricDescriptor>,
    pub admin_edge_port: Arc<MetricDescriptor>,
    pub auto_edge_port: Arc<MetricDescriptor>,
    pub oper_edge_port: Arc<MetricDescriptor>,
    pub point_to_point: Arc<MetricDescriptor>,
    pub port_hello_time: Arc<MetricDescriptor>,
    pub bpdu_guard_port: Arc<MetricDescriptor>,
    pub num_tx_bpdu: Arc<MetricDescriptor>,
    pub num_tx_tcn: Arc<MetricDescriptor>,
    pub num_rx_bpdu: Arc<MetricDescriptor>,
    pub num_rx_tcn: Arc<MetricDescriptor>,
    pub num_trans_fwd: Arc<MetricDescriptor>,
    pub num_trans_blk: Arc<MetricDescriptor>,
    pub bpdu_filter_port: Arc<MetricDescriptor>,
    pub clag_role_info: Arc<MetricDescriptor>,
    pub clag_dual_conn_mac_info: Arc<MetricDescriptor>,
    pub clag_system_mac_info: Arc<MetricDescriptor>,
}

fn port(name: &str, help: &str) -> Arc<MetricDescriptor> {
    MetricDescriptor::gauge(format!("{PREFIX}{name}"), help, PORT_LABELS)
}

fn info(name: &str, help: &str, label: &str) -> Arc<MetricDescriptor> {
    let labels = PORT_LABELS.iter().copied().chain([label]);
    MetricDescriptor::gauge(format!("{PREFIX}{name}"), help, labels)
}

impl MstpdMetrics {
    fn new() -> Self {
        Self {
            enabled: port("enabled_bool", "enabled"),
            role_info: info("role_info", "role", "role"),
            state_info: info("state_info", "state", "state"),
            ext_port_cost: port("ext_port_cost", "external port cost"),
            admin_ext_port_cost: port("admin_ext_port_cost", "admin external port cost"),
            int_port_cost: port("int_port_cost", "internal port cost"),
            admin_int_port_cost: port("admin_int_port_cost", "admin internal port cost"),
            dsgn_ext_cost: port("dsgn_ext_cost", "designated external cost"),
            dsgn_int_cost: port("dsgn_int_cost", "designated internal cost"),
            admin_edge_port: port("admin_edge_port_bool", "admin edge port"),
            auto_edge_port: port("auto_edge_port_bool", "auto edge port"),
            oper_edge_port: port("oper_edge_port_bool", "oper edge port"),
            point_to_point: port("point_to_point_bool", "point-to-point"),
            port_hello_time: port("port_hello_time_seconds", "port hello time in seconds"),
            bpdu_guard_port: port("bpdu_guard_port_bool", "bpdu guard port"),
            num_tx_bpdu: port("num_tx_bpdu_total", "Num TX BPDU"),
            num_tx_tcn: port("num_tx_tcn_total", "Num TX TCN"),
            num_rx_bpdu: port("num_rx_bpdu_total", "Num RX BPDU"),
            num_rx_tcn: port("num_rx_tcn_total", "Num RX TCN"),
            num_trans_fwd: port("num_trans_fw_total", "Num Transition FWD"),
            num_trans_blk: port("num_trans_blk_total", "Num Transition BLK"),
            bpdu_filter_port: port("bpdu_filter_port_bool", "bpdufilter port"),
            clag_role_info: info("clag_role_info", "clag role", "clag_role"),
            clag_dual_conn_mac_info: info(
                "clag_dual_conn_mac_info",
                "clag dual conn mac",
                "clag_dual_conn_mac",
            ),
            clag_system_mac_info: info("clag_system_mac_info", "clag system mac", "clag_system_mac"),
        }
    }

    /// All descriptors in emission order.
    pub fn all(&self) -> Vec<Arc<MetricDescriptor>> {
        [
            &self.enabled,
            &self.role_info,
            &self.state_info,
            &self.ext_port_cost,
            &self.admin_ext_port_cost,
            &self.int_port_cost,
            &self.admin_int_port_cost,
            &self.dsgn_ext_cost,
            &self.dsgn_int_cost,
            &self.admin_edge_port,
            &self.auto_edge_port,
            &self.oper_edge_port,
            &self.point_to_point,
            &self.port_hello_time,
            &self.bpdu_guard_port,
            &self.num_tx_bpdu,
            &self.num_tx_tcn,
            &self.num_rx_bpdu,
            &self.num_rx_tcn,
            &self.num_trans_fwd,
            &self.num_trans_blk,
            &self.bpdu_filter_port,
            &self.clag_role_info,
            &self.clag_dual_conn_mac_info,
            &self.clag_system_mac_info,
        ]
        .into_iter()
        .map(Arc::clone)
        .collect()
    }
}

/// Shared spanning-tree descriptors.
pub fn metrics() -> &'static MstpdMetrics {
    static METRICS: OnceLock<MstpdMetrics> = OnceLock::new();
    METRICS.get_or_init(MstpdMetrics::new)
}

impl PortDetails {
    /// One sample per attribute, booleans as 1/0, strings as info gauges.
    pub fn samples(&self) -> Vec<Sample> {
        let m = metrics();
        let labels = [self.bridge_name.clone(), self.port_name.clone()];
        let gauge = |d: &Arc<MetricDescriptor>, v: f64| Sample::new(d, v, labels.clone());
        let info = |d: &Arc<MetricDescriptor>, text: &str| {
            let labels = labels.iter().cloned().chain([text.to_string()]);
            Sample::new(d, 1.0, labels)
        };

        vec![
            gauge(&m.enabled, bool_to_f64(self.enabled)),
            info(&m.role_info, &self.role),
            info(&m.state_info, &self.state),
            gauge(&m.ext_port_cost, self.ext_port_cost),
            gauge(&m.admin_ext_port_cost, self.admin_ext_port_cost),
            gauge(&m.int_port_cost, self.int_port_cost),
            gauge(&m.admin_int_port_cost, self.admin_int_port_cost),
            gauge(&m.dsgn_ext_cost, self.dsgn_ext_cost),
            gauge(&m.dsgn_int_cost, self.dsgn_int_cost),
            gauge(&m.admin_edge_port, bool_to_f64(self.admin_edge_port)),
            gauge(&m.auto_edge_port, bool_to_f64(self.auto_edge_port)),
            gauge(&m.oper_edge_port, bool_to_f64(self.oper_edge_port)),
            gauge(&m.point_to_point, bool_to_f64(self.point_to_point)),
            gauge(&m.port_hello_time, self.port_hello_time),
            gauge(&m.bpdu_guard_port, bool_to_f64(self.bpdu_guard_port)),
            gauge(&m.num_tx_bpdu, self.num_tx_bpdu),
            gauge(&m.num_tx_tcn, self.num_tx_tcn),
            gauge(&m.num_rx_bpdu, self.num_rx_bpdu),
            gauge(&m.num_rx_tcn, self.num_rx_tcn),
            gauge(&m.num_trans_fwd, self.num_trans_fwd),
            gauge(&m.num_trans_blk, self.num_trans_blk),
            gauge(&m.bpdu_filter_port, bool_to_f64(self.bpdu_filter_port)),
            info(&m.clag_role_info, &self.clag_role),
            info(&m.clag_dual_conn_mac_info, &self.clag_dual_conn_mac),
            info(&m.clag_system_mac_info, &self.clag_system_mac),
        ]
    }
}

/// Decode `mstpctl showportdetail <bridge> json` output.
pub fn parse_show_port_detail(data: &[u8]) -> Result<ShowPortDetail, serde_json::Error> {
    serde_json::from_slice(data)
}
