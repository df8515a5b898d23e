use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvest_bus::{MessageBus, MessageHandler};
use harvest_common::{spaced_service_name, HarvestStatus, Msg, StatusMessage};
use harvest_warc::{iter_warc_items, IterFilters, WarcRecordHandler};
use tracing::{info, warn};

use crate::catalog::CatalogClient;
use crate::error::{ExportError, Result};
use crate::request::{ExportFormat, ExportRequest};
use crate::writer::write_segmented;

/// Consumer variant that turns an export request into tabular/line-oriented
/// output files, generic over the platform's [`WarcRecordHandler`] the same
/// way [`harvest_worker::HarvesterWorker`] is generic over a harvest
/// producer — no platform-specific extraction logic lives in this crate.
pub struct ExportRuntime<H: WarcRecordHandler + 'static> {
    handler: Arc<H>,
    catalog: Arc<dyn CatalogClient>,
    bus: Arc<dyn MessageBus>,
    service_name: String,
}

impl<H: WarcRecordHandler + 'static> ExportRuntime<H> {
    pub fn new(
        handler: Arc<H>,
        catalog: Arc<dyn CatalogClient>,
        bus: Arc<dyn MessageBus>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            handler,
            catalog,
            bus,
            service_name: spaced_service_name(&service_name.into()),
        }
    }

    async fn handle_export(&self, routing_key: &str, body: &[u8]) -> Result<()> {
        let mut request: ExportRequest = serde_json::from_slice(body)?;
        request.routing_key = routing_key.to_string();
        let started = Utc::now();

        self.publish_status(&request, HarvestStatus::Running, started, None, &[], 0)
            .await?;

        match self.run_export(&request).await {
            Ok(item_count) => {
                info!(export_id = %request.id, item_count, "export completed");
                self.publish_status(
                    &request,
                    HarvestStatus::CompletedSuccess,
                    started,
                    Some(Utc::now()),
                    &[],
                    item_count,
                )
                .await?;
            }
            Err(e) => {
                warn!(export_id = %request.id, error = %e, "export failed");
                let msg = Msg::new(e.wire_code(), e.to_string());
                self.publish_status(
                    &request,
                    HarvestStatus::CompletedFailure,
                    started,
                    Some(Utc::now()),
                    std::slice::from_ref(&msg),
                    0,
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn run_export(&self, request: &ExportRequest) -> Result<usize> {
        if matches!(request.format, ExportFormat::Xlsx | ExportFormat::Html) {
            return Err(ExportError::NotYetImplemented { format: request.format });
        }

        let descriptors = self
            .catalog
            .warcs(
                &request.collection.id,
                &request.seed_ids,
                request.harvest_date_start,
                request.harvest_date_end,
                request.created_date_start,
                request.created_date_end,
            )
            .await?;

        if descriptors.is_empty() {
            return Err(ExportError::NoWarcs { id: request.id.clone() });
        }

        let mut paths = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            if !descriptor.path.exists() {
                return Err(ExportError::WarcMissing { path: descriptor.path.clone() });
            }
            paths.push(descriptor.path.clone());
        }

        let filters = IterFilters {
            limit_item_types: request
                .limit_item_types
                .clone()
                .map(|types| types.into_iter().collect::<HashSet<_>>()),
            item_date_start: request.item_date_start,
            item_date_end: request.item_date_end,
            dedupe: request.dedupe,
        };

        let items = iter_warc_items(&paths, self.handler.as_ref(), &filters)?;

        let safe_id = harvest_common::safe_string(&request.id);
        let tmp_dir = request.path.with_file_name(format!(".{safe_id}.export.tmp"));
        if tmp_dir.exists() {
            std::fs::remove_dir_all(&tmp_dir)?;
        }
        std::fs::create_dir_all(&tmp_dir)?;

        write_segmented(&items, request.format, request.segment_size, &safe_id, &tmp_dir)?;

        if request.path.exists() {
            std::fs::remove_dir_all(&request.path)?;
        }
        std::fs::rename(&tmp_dir, &request.path)?;

        Ok(items.len())
    }

    #[allow(clippy::too_many_arguments)]
    async fn publish_status(
        &self,
        request: &ExportRequest,
        status: HarvestStatus,
        started: DateTime<Utc>,
        ended: Option<DateTime<Utc>>,
        errors: &[Msg],
        item_count: usize,
    ) -> Result<()> {
        let mut stats = BTreeMap::new();
        if item_count > 0 {
            let mut counts = BTreeMap::new();
            counts.insert("item".to_string(), item_count as u64);
            stats.insert(Utc::now().format("%Y-%m-%d").to_string(), counts);
        }

        let message = StatusMessage {
            id: request.id.clone(),
            status,
            infos: Vec::new(),
            warnings: Vec::new(),
            errors: errors.to_vec(),
            date_started: started,
            date_ended: ended,
            stats,
            token_updates: BTreeMap::new(),
            uids: BTreeMap::new(),
            warcs: None,
            service: self.service_name.clone(),
            host: hostname(),
            instance: std::process::id().to_string(),
        };

        self.bus
            .publish(
                &status_routing_key(&request.routing_key),
                serde_json::to_vec(&message).expect("status message always serializes"),
            )
            .await?;
        Ok(())
    }
}

fn status_routing_key(start_routing_key: &str) -> String {
    if start_routing_key.is_empty() {
        return "export.status".to_string();
    }
    start_routing_key.replacen("export.start", "export.status", 1)
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

#[async_trait]
impl<H: WarcRecordHandler + 'static> MessageHandler for ExportRuntime<H> {
    async fn on_message(&self, routing_key: &str, body: &[u8]) -> anyhow::Result<()> {
        self.handle_export(routing_key, body).await?;
        Ok(())
    }
}
