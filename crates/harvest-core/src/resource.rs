//! # Resource Kinds and Dependency Graph
//!
//! Every syncable resource reads parent rows persisted by an earlier step.
//! Those reads are declared here as edges of a DAG and the execution plan is
//! derived from it, instead of being an implicit list.
//!
//! ```text
//! organizations ─┬─► farms ──► fields ─┬─► boundaries
//!                │                     ├─► field-operations
//!                │                     └─► flags
//!                ├─► equipment ─┬─► telemetry-snapshot, location-history,
//!                │              │   breadcrumbs, measurements, alerts,
//!                │              │   device-states, engine-hours,
//!                │              │   operational-hours
//!                │              └─────────────┐
//!                ├─► products, operators       ▼
//!                └──────────────────────► implements
//! ```
//!
//! The topological plan breaks ties by canonical position, so the sequential
//! plan is exactly [`ResourceKind::CANONICAL`]. [`ResourceGraph::waves`]
//! groups steps whose parents are all complete, for optional concurrent runs.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Resource Kind
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Organizations,
    Farms,
    Fields,
    Boundaries,
    Equipment,
    TelemetrySnapshot,
    LocationHistory,
    Breadcrumbs,
    FieldOperations,
    Products,
    Operators,
    Flags,
    Implements,
    Measurements,
    Alerts,
    DeviceStates,
    EngineHours,
    OperationalHours,
}

impl ResourceKind {
    /// The fixed sync order.
    pub const CANONICAL: [ResourceKind; 18] = [
        ResourceKind::Organizations,
        ResourceKind::Farms,
        ResourceKind::Fields,
        ResourceKind::Boundaries,
        ResourceKind::Equipment,
        ResourceKind::TelemetrySnapshot,
        ResourceKind::LocationHistory,
        ResourceKind::Breadcrumbs,
        ResourceKind::FieldOperations,
        ResourceKind::Products,
        ResourceKind::Operators,
        ResourceKind::Flags,
        ResourceKind::Implements,
        ResourceKind::Measurements,
        ResourceKind::Alerts,
        ResourceKind::DeviceStates,
        ResourceKind::EngineHours,
        ResourceKind::OperationalHours,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Organizations => "organizations",
            ResourceKind::Farms => "farms",
            ResourceKind::Fields => "fields",
            ResourceKind::Boundaries => "boundaries",
            ResourceKind::Equipment => "equipment",
            ResourceKind::TelemetrySnapshot => "telemetry-snapshot",
            ResourceKind::LocationHistory => "location-history",
            ResourceKind::Breadcrumbs => "breadcrumbs",
            ResourceKind::FieldOperations => "field-operations",
            ResourceKind::Products => "products",
            ResourceKind::Operators => "operators",
            ResourceKind::Flags => "flags",
            ResourceKind::Implements => "implements",
            ResourceKind::Measurements => "measurements",
            ResourceKind::Alerts => "alerts",
            ResourceKind::DeviceStates => "device-states",
            ResourceKind::EngineHours => "engine-hours",
            ResourceKind::OperationalHours => "operational-hours",
        }
    }

    /// Resources whose persisted rows this one reads as parents.
    pub fn dependencies(&self) -> &'static [ResourceKind] {
        use ResourceKind::*;
        match self {
            Organizations => &[],
            Farms => &[Organizations],
            Fields => &[Farms],
            Boundaries | FieldOperations | Flags => &[Fields],
            Equipment | Products | Operators => &[Organizations],
            TelemetrySnapshot | LocationHistory | Breadcrumbs | Measurements | Alerts
            | DeviceStates | EngineHours | OperationalHours => &[Equipment],
            Implements => &[Organizations, Equipment],
        }
    }

    fn canonical_index(&self) -> usize {
        ResourceKind::CANONICAL
            .iter()
            .position(|kind| kind == self)
            .unwrap_or(usize::MAX)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    /// Accepts the kebab-case name, camelCase, snake_case, and `aemp` for
    /// the telemetry snapshot.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if normalized == "aemp" || normalized == "telemetry" {
            return Ok(ResourceKind::TelemetrySnapshot);
        }
        ResourceKind::CANONICAL
            .into_iter()
            .find(|kind| kind.as_str().replace('-', "") == normalized)
            .ok_or_else(|| CoreError::unknown("resource", s))
    }
}

// =============================================================================
// Dependency Graph
// =============================================================================

/// DAG of resource syncs.
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    nodes: Vec<ResourceKind>,
    edges: HashMap<ResourceKind, Vec<ResourceKind>>,
}

impl Default for ResourceGraph {
    fn default() -> Self {
        Self::new(ResourceKind::CANONICAL.iter().map(|kind| (*kind, kind.dependencies().to_vec())))
    }
}

impl ResourceGraph {
    /// Builds a graph from `(node, dependencies)` pairs. Dependencies that
    /// are not themselves nodes are ignored.
    pub fn new(entries: impl IntoIterator<Item = (ResourceKind, Vec<ResourceKind>)>) -> Self {
        let mut nodes = Vec::new();
        let mut edges = HashMap::new();
        for (kind, deps) in entries {
            if !nodes.contains(&kind) {
                nodes.push(kind);
            }
            edges.insert(kind, deps);
        }
        let present: BTreeSet<ResourceKind> = nodes.iter().copied().collect();
        for deps in edges.values_mut() {
            deps.retain(|dep| present.contains(dep));
        }
        ResourceGraph { nodes, edges }
    }

    /// The sub-graph needed to sync `targets`, with all their ancestors.
    pub fn closure(targets: &[ResourceKind]) -> Self {
        let mut wanted = BTreeSet::new();
        let mut stack: Vec<ResourceKind> = targets.to_vec();
        while let Some(kind) = stack.pop() {
            if wanted.insert(kind) {
                stack.extend_from_slice(kind.dependencies());
            }
        }
        Self::new(
            wanted
                .into_iter()
                .map(|kind| (kind, kind.dependencies().to_vec())),
        )
    }

    fn deps(&self, kind: ResourceKind) -> &[ResourceKind] {
        self.edges.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sequential execution plan.
    ///
    /// Kahn's algorithm; among ready nodes the one earliest in the canonical
    /// order runs first.
    ///
    /// ## Returns
    /// * `Err(CoreError::DependencyCycle)` - names of nodes left unresolved
    pub fn plan(&self) -> CoreResult<Vec<ResourceKind>> {
        let mut done: BTreeSet<ResourceKind> = BTreeSet::new();
        let mut order = Vec::with_capacity(self.nodes.len());
        while order.len() < self.nodes.len() {
            let next = self
                .nodes
                .iter()
                .filter(|kind| !done.contains(*kind))
                .filter(|kind| self.deps(**kind).iter().all(|dep| done.contains(dep)))
                .min_by_key(|kind| kind.canonical_index())
                .copied();
            match next {
                Some(kind) => {
                    done.insert(kind);
                    order.push(kind);
                }
                None => return Err(self.cycle_error(&done)),
            }
        }
        Ok(order)
    }

    fn cycle_error(&self, done: &BTreeSet<ResourceKind>) -> CoreError {
        let mut stuck: Vec<ResourceKind> = self
            .nodes
            .iter()
            .filter(|kind| !done.contains(*kind))
            .copied()
            .collect();
        stuck.sort_by_key(ResourceKind::canonical_index);
        CoreError::DependencyCycle(stuck.iter().map(|kind| kind.to_string()).collect())
    }

    /// Groups of steps that may run concurrently: every member's
    /// dependencies are in earlier waves.
    pub fn waves(&self) -> CoreResult<Vec<Vec<ResourceKind>>> {
        let mut done: BTreeSet<ResourceKind> = BTreeSet::new();
        let mut waves = Vec::new();
        while done.len() < self.nodes.len() {
            let mut wave: Vec<ResourceKind> = self
                .nodes
                .iter()
                .filter(|kind| !done.contains(*kind))
                .filter(|kind| self.deps(**kind).iter().all(|dep| done.contains(dep)))
                .copied()
                .collect();
            if wave.is_empty() {
                return Err(self.cycle_error(&done));
            }
            wave.sort_by_key(ResourceKind::canonical_index);
            done.extend(wave.iter().copied());
            waves.push(wave);
        }
        Ok(waves)
    }
}

// =============================================================================
// Readable Tables
// =============================================================================

/// Tables exposed through the data-read endpoint, with their freshness
/// ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataTable {
    Organizations,
    Farms,
    Fields,
    Boundaries,
    Equipment,
    FieldOperations,
    Products,
    Operators,
    Flags,
    Implements,
    ImplementAttachments,
    LocationHistory,
    Breadcrumbs,
    MachineMeasurements,
    MachineAlerts,
    MachineDeviceStates,
    MachineEngineHours,
    MachineOperationalHours,
    ChemicalInventory,
    SprayApplications,
    SyncLog,
}

impl DataTable {
    pub const ALL: [DataTable; 21] = [
        DataTable::Organizations,
        DataTable::Farms,
        DataTable::Fields,
        DataTable::Boundaries,
        DataTable::Equipment,
        DataTable::FieldOperations,
        DataTable::Products,
        DataTable::Operators,
        DataTable::Flags,
        DataTable::Implements,
        DataTable::ImplementAttachments,
        DataTable::LocationHistory,
        DataTable::Breadcrumbs,
        DataTable::MachineMeasurements,
        DataTable::MachineAlerts,
        DataTable::MachineDeviceStates,
        DataTable::MachineEngineHours,
        DataTable::MachineOperationalHours,
        DataTable::ChemicalInventory,
        DataTable::SprayApplications,
        DataTable::SyncLog,
    ];

    /// SQL table name.
    pub fn table_name(&self) -> &'static str {
        match self {
            DataTable::Organizations => "organizations",
            DataTable::Farms => "farms",
            DataTable::Fields => "fields",
            DataTable::Boundaries => "boundaries",
            DataTable::Equipment => "equipment",
            DataTable::FieldOperations => "field_operations",
            DataTable::Products => "products",
            DataTable::Operators => "operators",
            DataTable::Flags => "flags",
            DataTable::Implements => "implements",
            DataTable::ImplementAttachments => "implement_attachments",
            DataTable::LocationHistory => "equipment_location_history",
            DataTable::Breadcrumbs => "equipment_breadcrumbs",
            DataTable::MachineMeasurements => "machine_measurements",
            DataTable::MachineAlerts => "machine_alerts",
            DataTable::MachineDeviceStates => "machine_device_states",
            DataTable::MachineEngineHours => "machine_engine_hours",
            DataTable::MachineOperationalHours => "machine_operational_hours",
            DataTable::ChemicalInventory => "chemical_inventory",
            DataTable::SprayApplications => "spray_applications",
            DataTable::SyncLog => "sync_log",
        }
    }

    /// Column rows are returned newest-first by.
    pub fn order_column(&self) -> &'static str {
        match self {
            DataTable::LocationHistory
            | DataTable::Breadcrumbs
            | DataTable::MachineMeasurements
            | DataTable::MachineDeviceStates
            | DataTable::MachineEngineHours => "recorded_at",
            DataTable::MachineOperationalHours => "start_time",
            DataTable::ImplementAttachments => "attached_at",
            DataTable::ChemicalInventory => "updated_at",
            DataTable::SprayApplications => "application_date",
            DataTable::SyncLog => "started_at",
            _ => "synced_at",
        }
    }
}

impl FromStr for DataTable {
    type Err = CoreError;

    /// Accepts the SQL table name or its kebab-case form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_");
        DataTable::ALL
            .into_iter()
            .find(|table| table.table_name() == wanted)
            .ok_or_else(|| CoreError::unknown("table", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan_is_canonical_order() {
        let plan = ResourceGraph::default().plan().unwrap();
        assert_eq!(plan, ResourceKind::CANONICAL.to_vec());
    }

    #[test]
    fn test_every_dependency_precedes_dependent() {
        let plan = ResourceGraph::default().plan().unwrap();
        for (i, kind) in plan.iter().enumerate() {
            for dep in kind.dependencies() {
                let dep_pos = plan.iter().position(|k| k == dep).unwrap();
                assert!(dep_pos < i, "{} must run before {}", dep, kind);
            }
        }
    }

    #[test]
    fn test_waves_group_independent_branches() {
        let waves = ResourceGraph::default().waves().unwrap();
        assert_eq!(waves[0], vec![ResourceKind::Organizations]);
        assert_eq!(
            waves[1],
            vec![
                ResourceKind::Farms,
                ResourceKind::Equipment,
                ResourceKind::Products,
                ResourceKind::Operators,
            ]
        );
        assert!(waves[2].contains(&ResourceKind::Fields));
        assert!(waves[2].contains(&ResourceKind::Implements));
        assert_eq!(waves.iter().map(Vec::len).sum::<usize>(), 18);
    }

    #[test]
    fn test_cycle_is_reported() {
        let graph = ResourceGraph::new([
            (ResourceKind::Farms, vec![ResourceKind::Fields]),
            (ResourceKind::Fields, vec![ResourceKind::Farms]),
            (ResourceKind::Organizations, vec![]),
        ]);
        match graph.waves() {
            Err(CoreError::DependencyCycle(names)) => {
                assert_eq!(names, vec!["farms".to_string(), "fields".to_string()]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
        assert!(graph.plan().is_err());
    }

    #[test]
    fn test_closure_pulls_in_ancestors() {
        let plan = ResourceGraph::closure(&[ResourceKind::Boundaries]).plan().unwrap();
        assert_eq!(
            plan,
            vec![
                ResourceKind::Organizations,
                ResourceKind::Farms,
                ResourceKind::Fields,
                ResourceKind::Boundaries,
            ]
        );
    }

    #[test]
    fn test_resource_name_parsing() {
        assert_eq!("fields".parse::<ResourceKind>().unwrap(), ResourceKind::Fields);
        assert_eq!(
            "locationHistory".parse::<ResourceKind>().unwrap(),
            ResourceKind::LocationHistory
        );
        assert_eq!(
            "device_states".parse::<ResourceKind>().unwrap(),
            ResourceKind::DeviceStates
        );
        assert_eq!(
            "aemp".parse::<ResourceKind>().unwrap(),
            ResourceKind::TelemetrySnapshot
        );
        assert!("tractors".parse::<ResourceKind>().is_err());
        assert_eq!(ResourceKind::FieldOperations.to_string(), "field-operations");
    }

    #[test]
    fn test_data_tables() {
        assert_eq!(
            "sync_log".parse::<DataTable>().unwrap().order_column(),
            "started_at"
        );
        assert_eq!(
            "field-operations".parse::<DataTable>().unwrap().table_name(),
            "field_operations"
        );
        assert_eq!(DataTable::Farms.order_column(), "synced_at");
        assert!("credentials".parse::<DataTable>().is_err());
    }
}
