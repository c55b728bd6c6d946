use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use homeflow_core::{
    AgentId, DirectoryEntry, DirectoryPage, DirectoryQuery, DirectoryService, OperationError,
    Priority, PropertyId, Role,
};

use crate::faults::Faults;

/// Attribute naming the agent a property is assigned to
pub const AGENT_ATTRIBUTE: &str = "agent_id";

/// A directory entry plus the attributes filters match against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// Entry as returned to callers
    pub entry: DirectoryEntry,

    /// Filterable attributes
    pub attributes: BTreeMap<String, String>,
}

impl DirectoryRecord {
    fn matches(&self, filters: &BTreeMap<String, String>) -> bool {
        filters.iter().all(|(key, wanted)| match key.as_str() {
            "id" => &self.entry.id == wanted,
            _ => self
                .attributes
                .get(key)
                .map(|value| value.eq_ignore_ascii_case(wanted))
                .unwrap_or(false),
        })
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    properties: Vec<DirectoryRecord>,
    agents: Vec<DirectoryRecord>,
}

/// In-memory role directories.
///
/// Buyers list properties, sellers list agents, and agents list the
/// properties carrying their `agent_id` attribute. Filters are exact,
/// case-insensitive attribute matches.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: RwLock<DirectoryState>,
    faults: Faults,
}

impl InMemoryDirectory {
    /// Empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory with a small fixed catalogue
    pub fn seeded() -> Self {
        let mut state = DirectoryState::default();

        let properties = [
            ("prop-1", "Harbour View Flat", "Bristol", 325_000_00, Some(("agent-1", Priority::High))),
            ("prop-2", "Garden Cottage", "Bath", 410_000_00, Some(("agent-1", Priority::Normal))),
            ("prop-3", "Canal Loft", "Bristol", 275_000_00, Some(("agent-2", Priority::Low))),
            ("prop-4", "Victorian Terrace", "Cardiff", 299_500_00, None),
        ];
        for (id, title, location, price_cents, assignment) in properties {
            state.properties.push(property_record(id, title, location, price_cents, assignment));
        }

        let agents = [("agent-1", "Alex Morgan", "Bristol"), ("agent-2", "Sam Patel", "Bath")];
        for (id, name, region) in agents {
            state.agents.push(agent_record(id, name, region));
        }

        Self {
            state: RwLock::new(state),
            faults: Faults::new(),
        }
    }

    /// Failure and latency injection
    pub fn faults(&self) -> &Faults {
        &self.faults
    }

    /// Add a property listing, optionally assigned to an agent
    pub async fn add_property(
        &self,
        id: &PropertyId,
        title: &str,
        location: &str,
        price_cents: u64,
        assignment: Option<(&AgentId, Priority)>,
    ) {
        let record = property_record(
            &id.0,
            title,
            location,
            price_cents,
            assignment.map(|(agent, priority)| (agent.0.as_str(), priority)),
        );
        self.state.write().await.properties.push(record);
    }

    /// Add an agent to the sellers' directory
    pub async fn add_agent(&self, id: &AgentId, name: &str, region: &str) {
        self.state
            .write()
            .await
            .agents
            .push(agent_record(&id.0, name, region));
    }
}

fn property_record(
    id: &str,
    title: &str,
    location: &str,
    price_cents: u64,
    assignment: Option<(&str, Priority)>,
) -> DirectoryRecord {
    let mut attributes = BTreeMap::new();
    attributes.insert("location".to_string(), location.to_string());
    if let Some((agent_id, _)) = assignment {
        attributes.insert(AGENT_ATTRIBUTE.to_string(), agent_id.to_string());
    }

    DirectoryRecord {
        entry: DirectoryEntry {
            id: id.to_string(),
            title: title.to_string(),
            location: Some(location.to_string()),
            price_cents: Some(price_cents),
            priority: assignment.map(|(_, priority)| priority),
        },
        attributes,
    }
}

fn agent_record(id: &str, name: &str, region: &str) -> DirectoryRecord {
    let mut attributes = BTreeMap::new();
    attributes.insert("region".to_string(), region.to_string());

    DirectoryRecord {
        entry: DirectoryEntry {
            id: id.to_string(),
            title: name.to_string(),
            location: Some(region.to_string()),
            price_cents: None,
            priority: None,
        },
        attributes,
    }
}

#[async_trait]
impl DirectoryService for InMemoryDirectory {
    async fn list_directory(&self, query: DirectoryQuery) -> Result<DirectoryPage, OperationError> {
        self.faults.check().await?;

        if query.page == 0 || query.page_size == 0 {
            return Err(OperationError::Validation(
                "Page and page size must be positive".to_string(),
            ));
        }

        let state = self.state.read().await;
        let matching: Vec<DirectoryEntry> = match query.role {
            Role::Buyer => state
                .properties
                .iter()
                .filter(|record| record.matches(&query.filters))
                .map(|record| DirectoryEntry {
                    priority: None,
                    ..record.entry.clone()
                })
                .collect(),
            Role::Seller => state
                .agents
                .iter()
                .filter(|record| record.matches(&query.filters))
                .map(|record| record.entry.clone())
                .collect(),
            Role::Agent => {
                if !query.filters.contains_key(AGENT_ATTRIBUTE) {
                    return Err(OperationError::Validation(
                        "Agent listings need an agent_id filter".to_string(),
                    ));
                }
                state
                    .properties
                    .iter()
                    .filter(|record| record.matches(&query.filters))
                    .map(|record| record.entry.clone())
                    .collect()
            }
        };

        let total = matching.len() as u64;
        let page_size = query.page_size as usize;
        let total_pages = matching.len().div_ceil(page_size) as u32;
        let start = (query.page as usize - 1).saturating_mul(page_size);
        let items: Vec<DirectoryEntry> = matching.into_iter().skip(start).take(page_size).collect();

        debug!(
            role = %query.role,
            page = query.page,
            returned = items.len(),
            total,
            "Directory page listed"
        );

        Ok(DirectoryPage {
            items,
            total,
            page: query.page,
            total_pages,
        })
    }
}
