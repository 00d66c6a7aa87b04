use crate::{Error, Result};
use std::fmt;

/// A fully qualified topic partition.
///
/// Equality is structural; the stringified form (`Display`) is what appears
/// in logs and wire lookups. A `Topic` without a partition index refers to
/// the logical topic; `with_partition` pins it to a single shard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    pub tenant: String,
    pub namespace: String,
    pub name: String,
    pub partition: Option<u32>,
}

impl Topic {
    pub fn new(
        tenant: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            namespace: namespace.into(),
            name: name.into(),
            partition: None,
        }
    }

    /// Pin this topic to a single partition.
    pub fn with_partition(mut self, partition: u32) -> Self {
        self.partition = Some(partition);
        self
    }

    /// Parse `persistent://tenant/ns/name`, `tenant/ns/name`, or a bare
    /// topic name (which lands in the `public/default` namespace).
    pub fn parse(input: &str) -> Result<Self> {
        let stripped = input.strip_prefix("persistent://").unwrap_or(input);
        let segments: Vec<&str> = stripped.split('/').collect();
        match segments.as_slice() {
            [name] if !name.is_empty() => Ok(Self::new("public", "default", *name)),
            [tenant, namespace, name]
                if !tenant.is_empty() && !namespace.is_empty() && !name.is_empty() =>
            {
                Ok(Self::new(*tenant, *namespace, *name))
            }
            _ => Err(Error::InvalidConfig(format!("malformed topic '{input}'"))),
        }
    }

    /// Path segment used by the admin lookup endpoint:
    /// `persistent/tenant/ns/name[-partition-N]`.
    pub fn lookup_path(&self) -> String {
        format!(
            "persistent/{}/{}/{}",
            self.tenant,
            self.namespace,
            self.partitioned_name()
        )
    }

    fn partitioned_name(&self) -> String {
        match self.partition {
            Some(partition) => format!("{}-partition-{}", self.name, partition),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "persistent://{}/{}/{}",
            self.tenant,
            self.namespace,
            self.partitioned_name()
        )
    }
}
