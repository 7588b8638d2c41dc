use super::{completed, DiscoveryData, ScanData};
use crate::error::MigrationError;
use crate::executor::{StepContext, StepExecutor};
use crate::state::MigrationState;
use crate::step::MigrationStep;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use stackshift_discovery::DiscoveryOptions;

/// Discovers live resources for every supported type in the template
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveryStep;

#[async_trait::async_trait]
impl StepExecutor for DiscoveryStep {
    fn step(&self) -> MigrationStep {
        MigrationStep::Discovery
    }

    fn validate_prerequisites(&self, state: &MigrationState) -> bool {
        completed(state, &[MigrationStep::InitialScan])
    }

    #[tracing::instrument(skip_all, fields(migration_id = %ctx.migration_id))]
    async fn execute_step(
        &self,
        state: &MigrationState,
        ctx: &StepContext,
    ) -> Result<Value, MigrationError> {
        let scan: ScanData = state.step_data(MigrationStep::InitialScan, self.step())?;
        let region = state.config.region.as_str();
        let types: Vec<_> = scan
            .resource_types
            .into_iter()
            .filter(|t| t.is_supported())
            .collect();

        // Fan out per type; results are merged before the step completes
        let resources = stream::iter(types)
            .map(|resource_type| {
                let discovery = ctx.discovery.clone();
                async move {
                    let found = discovery
                        .discover_resource_type(&resource_type, Some(region), DiscoveryOptions::default())
                        .await?;
                    Ok::<_, MigrationError>((resource_type.to_string(), found))
                }
            })
            .buffer_unordered(state.config.discovery.concurrency.max(1))
            .try_collect()
            .await?;

        let data = DiscoveryData {
            region: region.to_string(),
            resources,
        };
        tracing::info!(
            region,
            types = data.resources.len(),
            resources = data.total(),
            "discovery finished"
        );
        Ok(serde_json::to_value(data)?)
    }
}
