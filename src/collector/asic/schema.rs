//! Mode-dependent metric schema for switchd counters.
//!
//! switchd reports host and route table occupancy in two slots whose meaning
//! depends on how the ASIC tables are partitioned, which can change at
//! runtime. [`build_tasks`] maps the two current modes to the list of
//! [`PollTask`]s to execute, with no I/O, so it can be checked exhaustively.

use std::sync::{Arc, OnceLock};

use strum_macros::{AsRefStr, Display};

use crate::metric::MetricDescriptor;

/// Prefix of every switchd metric name.
pub const PREFIX: &str = "cumulus_switchd_";

/// Label distinguishing current, maximum and allocated readings.
pub const READING_TYPE_LABEL: &str = "reading_type";

/// File holding the host table mode.
pub const HOST_MODE_PATH: &str = "route_info/host/mode";

/// File holding the route table mode.
pub const ROUTE_MODE_PATH: &str = "route_info/route/mode";

/// Partitioning mode of a host or route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    /// Two family-agnostic slots. Also used for unknown values.
    #[default]
    Generic,
    /// Slot 0 covers IPv4 and IPv6 together.
    Combined,
    /// Slot 0 is IPv4, slot 1 is IPv6.
    Split,
}

impl Mode {
    /// Interpret a raw mode reading.
    ///
    /// Integral values other than 1 and 2 select [`Mode::Generic`]; a
    /// fractional or non-finite reading is not a mode at all.
    pub fn from_value(value: f64) -> Option<Self> {
        if !value.is_finite() || value.fract() != 0.0 {
            return None;
        }
        Some(match value as i64 {
            1 => Self::Combined,
            2 => Self::Split,
            _ => Self::Generic,
        })
    }
}

/// Which quantity a reading represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ReadingType {
    Current,
    Max,
    Allocated,
}

/// One file to read and the reading type it is emitted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub reading_type: ReadingType,
    /// Path relative to the switchd run directory.
    pub path: String,
}

/// A resolved unit of work: read every [`Reading`], then emit one sample per
/// reading under `descriptor`.
#[derive(Debug, Clone)]
pub struct PollTask {
    descriptor: Arc<MetricDescriptor>,
    readings: Vec<Reading>,
}

impl PollTask {
    fn new(descriptor: &Arc<MetricDescriptor>, readings: &[(ReadingType, &str)]) -> Self {
        Self {
            descriptor: Arc::clone(descriptor),
            readings: readings
                .iter()
                .map(|(reading_type, path)| Reading {
                    reading_type: *reading_type,
                    path: (*path).to_string(),
                })
                .collect(),
        }
    }

    /// Descriptor the readings are emitted under.
    pub fn descriptor(&self) -> &Arc<MetricDescriptor> {
        &self.descriptor
    }

    /// Readings in emission order.
    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }
}

/// File layout of a mode-independent family.
#[derive(Debug, Clone, Copy)]
enum Layout {
    /// Current value only.
    Current(&'static str),
    /// Current and maximum value.
    CurrentMax(&'static str, &'static str),
    /// Table directory with `entries_used`, `entries_max`, `entries_allocated`.
    Allocation(&'static str),
}

struct Family {
    name: &'static str,
    help: &'static str,
    layout: Layout,
}

const fn family(name: &'static str, help: &'static str, layout: Layout) -> Family {
    Family { name, help, layout }
}

/// Families present regardless of table modes, in emission order.
const FIXED_FAMILIES: &[Family] = &[
    family("neighbor_v4_entry", "IPv4 neighbors", Layout::Current("route_info/host/count_v4")),
    family("neighbor_v6_entry", "IPv6 neighbors", Layout::Current("route_info/host/count_v6")),
    family(
        "route_total_entry",
        "Total Routes",
        Layout::CurrentMax("route_info/route/count_total", "route_info/route/max_total"),
    ),
    family(
        "ecmp_nh_entry",
        "ECMP nexthops",
        Layout::CurrentMax("route_info/ecmp_nh/count", "route_info/ecmp_nh/max"),
    ),
    family(
        "mac_entry",
        "MAC entries",
        Layout::CurrentMax("route_info/mac/count", "route_info/mac/max"),
    ),
    family(
        "mroute_total_entry",
        "Total Mcast Routes",
        Layout::CurrentMax("route_info/mroute/count_total", "route_info/mroute/max_total"),
    ),
    family(
        "in_acl_entry",
        "Ingress ACL entries",
        Layout::CurrentMax("acl_info/ingress/entries", "acl_info/ingress/entries_total"),
    ),
    family(
        "in_acl_counter",
        "Ingress ACL counters",
        Layout::CurrentMax("acl_info/ingress/counters", "acl_info/ingress/counters_total"),
    ),
    family(
        "in_acl_meter",
        "Ingress ACL meters",
        Layout::CurrentMax("acl_info/ingress/meters", "acl_info/ingress/meters_total"),
    ),
    family(
        "in_acl_slice",
        "Ingress ACL slices",
        Layout::CurrentMax("acl_info/ingress/slices", "acl_info/ingress/slices_total"),
    ),
    family(
        "eg_acl_entry",
        "Egress ACL entries",
        Layout::CurrentMax("acl_info/egress/entries", "acl_info/egress/entries_total"),
    ),
    family(
        "eg_acl_counter",
        "Egress ACL counters",
        Layout::CurrentMax("acl_info/egress/counters", "acl_info/egress/counters_total"),
    ),
    family(
        "eg_acl_meter",
        "Egress ACL meters",
        Layout::CurrentMax("acl_info/egress/meters", "acl_info/egress/meters_total"),
    ),
    family(
        "eg_acl_slice",
        "Egress ACL slices",
        Layout::CurrentMax("acl_info/egress/slices", "acl_info/egress/slices_total"),
    ),
    family(
        "in_acl_v4mac_filter",
        "Ingress ACL ipv4_mac filter table",
        Layout::Allocation("acl_info/ingress/v4mac_filter"),
    ),
    family(
        "in_acl_v6_filter",
        "Ingress ACL ipv6 filter table",
        Layout::Allocation("acl_info/ingress/v6_filter"),
    ),
    family(
        "in_acl_mirror_filter",
        "Ingress ACL mirror table",
        Layout::Allocation("acl_info/ingress/mirror_filter"),
    ),
    // switchd names each ACL table directory after the table, so this reads
    // acl_info/ingress/8021x_filter/entries_{used,max,allocated}. A switch
    // without the 802.1X table lacks the directory and reports a resource
    // error for this family on every poll.
    family(
        "in_acl_8021x_filter",
        "Ingress ACL 8021x filter table",
        Layout::Allocation("acl_info/ingress/8021x_filter"),
    ),
    family(
        "in_pbr_v4mac_filter",
        "Ingress PBR ipv4_mac filter table",
        Layout::Allocation("iprule/info/ingress/v4mac_filter"),
    ),
    family(
        "in_pbr_v6_filter",
        "Ingress PBR ipv6 filter table",
        Layout::Allocation("iprule/info/ingress/v6_filter"),
    ),
    family(
        "in_acl_v4mac_mangle",
        "Ingress ACL ipv4_mac mangle table",
        Layout::Allocation("acl_info/ingress/v4mac_mangle"),
    ),
    family(
        "in_acl_v6_mangle",
        "Ingress ACL ipv6 mangle table",
        Layout::Allocation("acl_info/ingress/v6_mangle"),
    ),
    family(
        "eg_acl_v4mac_filter",
        "Egress ACL ipv4_mac filter table",
        Layout::Allocation("acl_info/egress/v4mac_filter"),
    ),
    family(
        "eg_acl_v6_filter",
        "Egress ACL ipv6 filter table",
        Layout::Allocation("acl_info/egress/v6_filter"),
    ),
    family(
        "acl_l4_port_range_checkers",
        "ACL L4 port range checkers",
        Layout::CurrentMax(
            "acl_info/l4_port_range_checkers/entries_used",
            "acl_info/l4_port_range_checkers/entries_max",
        ),
    ),
];

/// Every switchd descriptor, created once per process.
#[derive(Debug)]
pub struct AsicMetrics {
    pub host_0: Arc<MetricDescriptor>,
    pub host_1: Arc<MetricDescriptor>,
    pub route_0: Arc<MetricDescriptor>,
    pub route_1: Arc<MetricDescriptor>,
    pub host_v4: Arc<MetricDescriptor>,
    pub host_v6: Arc<MetricDescriptor>,
    pub host_v46: Arc<MetricDescriptor>,
    pub route_v4: Arc<MetricDescriptor>,
    pub route_v6: Arc<MetricDescriptor>,
    pub route_v46: Arc<MetricDescriptor>,
    pub long_route_v6: Arc<MetricDescriptor>,
    fixed: Vec<(Arc<MetricDescriptor>, Layout)>,
}

fn gauge(name: &str, help: &str) -> Arc<MetricDescriptor> {
    MetricDescriptor::gauge(format!("{PREFIX}{name}"), help, [READING_TYPE_LABEL])
}

impl AsicMetrics {
    fn new() -> Self {
        Self {
            host_0: gauge("host_0_entry", "Host 0 entries"),
            host_1: gauge("host_1_entry", "Host 1 entries"),
            route_0: gauge("route_0_entry", "Route 0 entries"),
            route_1: gauge("route_1_entry", "Route 1 entries"),
            host_v4: gauge("host_v4_entry", "IPv4 host entries"),
            host_v6: gauge("host_v6_entry", "IPv6 host entries"),
            host_v46: gauge("host_v46_entry", "IPv4/IPv6 host entries"),
            route_v4: gauge("route_v4_entry", "IPv4 route entries"),
            route_v6: gauge("route_v6_entry", "IPv6 route entries"),
            route_v46: gauge("route_v46_entry", "IPv4/IPv6 route entries"),
            long_route_v6: gauge("long_route_v6_entry", "Long IPv6 route entries"),
            fixed: FIXED_FAMILIES
                .iter()
                .map(|f| (gauge(f.name, f.help), f.layout))
                .collect(),
        }
    }

    /// All descriptors, mode variants first.
    pub fn all(&self) -> Vec<Arc<MetricDescriptor>> {
        [
            &self.host_0,
            &self.host_1,
            &self.route_0,
            &self.route_1,
            &self.host_v4,
            &self.host_v6,
            &self.host_v46,
            &self.route_v4,
            &self.long_route_v6,
            &self.route_v6,
            &self.route_v46,
        ]
        .into_iter()
        .chain(self.fixed.iter().map(|(desc, _)| desc))
        .map(Arc::clone)
        .collect()
    }
}

/// Shared switchd descriptors.
pub fn metrics() -> &'static AsicMetrics {
    static METRICS: OnceLock<AsicMetrics> = OnceLock::new();
    METRICS.get_or_init(AsicMetrics::new)
}

fn slot_task(descriptor: &Arc<MetricDescriptor>, table: &str, slot: u8) -> PollTask {
    let count = format!("route_info/{table}/count_{slot}");
    let max = format!("route_info/{table}/max_{slot}");
    PollTask::new(
        descriptor,
        &[(ReadingType::Current, &count), (ReadingType::Max, &max)],
    )
}

fn host_0_task(m: &AsicMetrics, mode: Mode) -> PollTask {
    let desc = match mode {
        Mode::Combined => &m.host_v46,
        Mode::Split => &m.host_v4,
        Mode::Generic => &m.host_0,
    };
    slot_task(desc, "host", 0)
}

/// Slot 1 is folded into slot 0 when hosts are combined.
fn host_1_task(m: &AsicMetrics, mode: Mode) -> Option<PollTask> {
    match mode {
        Mode::Combined => None,
        Mode::Split => Some(slot_task(&m.host_v6, "host", 1)),
        Mode::Generic => Some(slot_task(&m.host_1, "host", 1)),
    }
}

fn route_0_task(m: &AsicMetrics, mode: Mode) -> PollTask {
    let desc = match mode {
        Mode::Combined => &m.route_v46,
        Mode::Split => &m.route_v4,
        Mode::Generic => &m.route_0,
    };
    slot_task(desc, "route", 0)
}

/// Unlike hosts, combined route mode keeps slot 1 for long IPv6 prefixes.
fn route_1_task(m: &AsicMetrics, mode: Mode) -> PollTask {
    let desc = match mode {
        Mode::Combined => &m.long_route_v6,
        Mode::Split => &m.route_v6,
        Mode::Generic => &m.route_1,
    };
    slot_task(desc, "route", 1)
}

fn fixed_task(descriptor: &Arc<MetricDescriptor>, layout: Layout) -> PollTask {
    match layout {
        Layout::Current(count) => PollTask::new(descriptor, &[(ReadingType::Current, count)]),
        Layout::CurrentMax(count, max) => PollTask::new(
            descriptor,
            &[(ReadingType::Current, count), (ReadingType::Max, max)],
        ),
        Layout::Allocation(table) => {
            let used = format!("{table}/entries_used");
            let max = format!("{table}/entries_max");
            let allocated = format!("{table}/entries_allocated");
            PollTask::new(
                descriptor,
                &[
                    (ReadingType::Current, &used),
                    (ReadingType::Max, &max),
                    (ReadingType::Allocated, &allocated),
                ],
            )
        }
    }
}

/// Resolve the poll tasks for the current host and route modes.
pub fn build_tasks(host_mode: Mode, route_mode: Mode) -> Vec<PollTask> {
    let m = metrics();
    let mut tasks = Vec::with_capacity(4 + m.fixed.len());

    tasks.push(host_0_task(m, host_mode));
    tasks.extend(host_1_task(m, host_mode));
    tasks.push(route_0_task(m, route_mode));
    tasks.push(route_1_task(m, route_mode));
    tasks.extend(m.fixed.iter().map(|(desc, layout)| fixed_task(desc, *layout)));

    tasks
}
