//! Device queries: UDID, name and a few lockdown values.

use serde::{Deserialize, Serialize};

use crate::commands;
use crate::error::{Result, ServiceError};
use crate::parser;
use crate::runner::Executor;

/// Lockdown keys read by [`fetch`].
pub const DEVICE_CLASS: &str = "DeviceClass";
pub const PRODUCT_TYPE: &str = "ProductType";
pub const PRODUCT_VERSION: &str = "ProductVersion";
pub const TOTAL_DISK_CAPACITY: &str = "TotalDiskCapacity";
pub const FREE_DISK_SPACE: &str = "FreeDiskSpace";

/// What is known about the first connected device. Fields whose query
/// failed are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub udid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ios_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_storage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_storage: Option<String>,
}

impl DeviceInfo {
    /// `(label, value)` pairs for display, in a fixed order.
    pub fn rows(&self) -> Vec<(&'static str, &str)> {
        let mut rows = vec![("UDID", self.udid.as_str())];
        let optional = [
            ("Name", &self.name),
            ("Class", &self.class),
            ("Type", &self.product_type),
            ("Version", &self.ios_version),
            ("Total storage", &self.total_storage),
            ("Free storage", &self.free_storage),
        ];
        rows.extend(
            optional
                .into_iter()
                .filter_map(|(label, value)| value.as_deref().map(|v| (label, v))),
        );
        rows
    }
}

async fn query_key(executor: &dyn Executor, udid: &str, key: &str) -> Option<String> {
    let result = executor.run(&commands::device_info_key(udid, key)).await;
    result.success.then(|| parser::info_value(&result.stdout))
}

async fn query_storage(executor: &dyn Executor, udid: &str, key: &str) -> Option<String> {
    let raw = query_key(executor, udid, key).await?;
    let formatted = parser::storage_gb(&raw);
    if formatted.is_none() {
        tracing::debug!(key, value = %raw, "non-numeric storage value");
    }
    formatted
}

/// Query the first connected device. Each key is a separate invocation.
pub async fn fetch(executor: &dyn Executor) -> Result<DeviceInfo> {
    let listing = executor.run(&commands::device_id()).await;
    let udid = listing
        .success
        .then(|| parser::first_udid(&listing.stdout))
        .flatten()
        .ok_or(ServiceError::NoDevice)?;

    let name = {
        let result = executor.run(&commands::device_name(&udid)).await;
        result.success.then(|| parser::info_value(&result.stdout))
    };

    Ok(DeviceInfo {
        name,
        class: query_key(executor, &udid, DEVICE_CLASS).await,
        product_type: query_key(executor, &udid, PRODUCT_TYPE).await,
        ios_version: query_key(executor, &udid, PRODUCT_VERSION).await,
        total_storage: query_storage(executor, &udid, TOTAL_DISK_CAPACITY).await,
        free_storage: query_storage(executor, &udid, FREE_DISK_SPACE).await,
        udid,
    })
}
