//! EC2 adapter for the [`CloudProvider`] trait.
//!
//! All AWS SDK usage is confined to this module. Errors are wrapped into
//! [`FleetError::Provider`] with a recoverable flag derived from the
//! provider's error code.

use crate::provider::CloudProvider;
use crate::types::{FailedInstance, FleetOutcome, FleetSpec, InstanceStatus};
use crate::FleetError;
use async_trait::async_trait;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::{
    DefaultTargetCapacityType, Filter, FleetLaunchTemplateConfigRequest,
    FleetLaunchTemplateOverridesRequest, FleetLaunchTemplateSpecificationRequest,
    FleetOnDemandAllocationStrategy, FleetType, InstanceType, OnDemandOptionsRequest, Placement,
    PlacementStrategy as AwsPlacementStrategy, ResourceType, SpotAllocationStrategy,
    SpotInstanceInterruptionBehavior, SpotOptionsRequest, Tag, TagSpecification,
    TargetCapacitySpecificationRequest,
};
use aws_sdk_ec2::Client;
use burst_analyzer::PlacementStrategy;
use std::collections::HashMap;
use tracing::warn;

/// Error codes that make a retry worthwhile.
const RECOVERABLE_CODES: &[&str] = &[
    "RequestLimitExceeded",
    "Throttling",
    "InsufficientInstanceCapacity",
    "InternalError",
    "Unavailable",
    "RequestExpired",
];

pub struct Ec2Cloud {
    client: Client,
    subnet_azs: tokio::sync::Mutex<HashMap<String, String>>,
}

impl Ec2Cloud {
    /// Build a client from the default provider chain, with optional
    /// explicit region and profile from the config file.
    pub async fn new(region: Option<String>, profile: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let shared = loader.load().await;
        Self {
            client: Client::new(&shared),
            subnet_azs: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    async fn subnet_az(&self, subnet: &str) -> Result<String, FleetError> {
        if let Some(az) = self.subnet_azs.lock().await.get(subnet) {
            return Ok(az.clone());
        }
        let resp = self
            .client
            .describe_subnets()
            .subnet_ids(subnet)
            .send()
            .await
            .map_err(provider_error)?;
        let az = resp
            .subnets()
            .first()
            .and_then(|s| s.availability_zone())
            .ok_or_else(|| {
                FleetError::provider(false, format!("subnet {subnet} has no availability zone"))
            })?
            .to_string();
        self.subnet_azs
            .lock()
            .await
            .insert(subnet.to_string(), az.clone());
        Ok(az)
    }
}

#[async_trait]
impl CloudProvider for Ec2Cloud {
    async fn create_fleet(&self, spec: &FleetSpec) -> Result<FleetOutcome, FleetError> {
        let mut overrides = Vec::with_capacity(spec.overrides.len());
        for o in &spec.overrides {
            let mut builder = FleetLaunchTemplateOverridesRequest::builder()
                .instance_type(InstanceType::from(o.shape.as_str()))
                .subnet_id(&o.subnet)
                .weighted_capacity(o.weight);
            if let Some(group) = &spec.placement_group {
                builder = builder.placement(Placement::builder().group_name(group).build());
            }
            overrides.push(builder.build());
        }

        let mut template = FleetLaunchTemplateSpecificationRequest::builder().version("$Default");
        if let Some(name) = &spec.launch_template.name {
            template = template.launch_template_name(name);
        }
        if let Some(id) = &spec.launch_template.id {
            template = template.launch_template_id(id);
        }

        let capacity = TargetCapacitySpecificationRequest::builder()
            .total_target_capacity(spec.total_capacity as i32)
            .spot_target_capacity(spec.spot_capacity as i32)
            .on_demand_target_capacity(spec.on_demand_capacity as i32)
            .default_target_capacity_type(if spec.prefer_preemptible {
                DefaultTargetCapacityType::Spot
            } else {
                DefaultTargetCapacityType::OnDemand
            })
            .build();

        let mut spot_options = SpotOptionsRequest::builder()
            .allocation_strategy(SpotAllocationStrategy::LowestPrice)
            .instance_interruption_behavior(SpotInstanceInterruptionBehavior::Terminate);
        if let Some(ceiling) = spec.price_ceiling {
            spot_options =
                spot_options.max_total_price((ceiling * f64::from(spec.total_capacity)).to_string());
        }

        let tags: Vec<Tag> = spec
            .tags
            .iter()
            .map(|(k, v)| Tag::builder().key(k).value(v).build())
            .collect();

        let resp = self
            .client
            .create_fleet()
            .r#type(FleetType::Instant)
            .target_capacity_specification(capacity)
            .launch_template_configs(
                FleetLaunchTemplateConfigRequest::builder()
                    .launch_template_specification(template.build())
                    .set_overrides(Some(overrides))
                    .build(),
            )
            .spot_options(spot_options.build())
            .on_demand_options(
                OnDemandOptionsRequest::builder()
                    .allocation_strategy(FleetOnDemandAllocationStrategy::LowestPrice)
                    .build(),
            )
            .tag_specifications(
                TagSpecification::builder()
                    .resource_type(ResourceType::Instance)
                    .set_tags(Some(tags))
                    .build(),
            )
            .send()
            .await
            .map_err(provider_error)?;

        let instance_ids = resp
            .instances()
            .iter()
            .flat_map(|fleet_instance| fleet_instance.instance_ids().iter().cloned())
            .collect();
        let errors = resp
            .errors()
            .iter()
            .map(|e| FailedInstance {
                shape: e
                    .launch_template_and_overrides()
                    .and_then(|lto| lto.overrides())
                    .and_then(|o| o.instance_type())
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_default(),
                code: e.error_code().unwrap_or_default().to_string(),
                message: e.error_message().unwrap_or_default().to_string(),
            })
            .collect();

        Ok(FleetOutcome { instance_ids, errors })
    }

    async fn describe_instances(&self, ids: &[String]) -> Result<Vec<InstanceStatus>, FleetError> {
        let resp = self
            .client
            .describe_instances()
            .set_instance_ids(Some(ids.to_vec()))
            .send()
            .await
            .map_err(provider_error)?;

        let mut statuses = Vec::new();
        for reservation in resp.reservations() {
            for instance in reservation.instances() {
                let Some(id) = instance.instance_id() else {
                    continue;
                };
                statuses.push(InstanceStatus {
                    id: id.to_string(),
                    state: instance
                        .state()
                        .and_then(|s| s.name())
                        .map(|n| n.as_str().to_string())
                        .unwrap_or_default(),
                    shape: instance.instance_type().map(|t| t.as_str().to_string()),
                    private_address: instance.private_ip_address().map(str::to_string),
                    public_address: instance.public_ip_address().map(str::to_string),
                    name_tag: instance
                        .tags()
                        .iter()
                        .find(|t| t.key() == Some("Name"))
                        .and_then(|t| t.value())
                        .map(str::to_string),
                    launched_at: instance.launch_time().and_then(|t| {
                        chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos())
                    }),
                });
            }
        }
        Ok(statuses)
    }

    async fn instances_by_tag(
        &self,
        tag_key: &str,
        values: &[String],
        states: &[&str],
    ) -> Result<Vec<String>, FleetError> {
        let mut pages = self
            .client
            .describe_instances()
            .filters(
                Filter::builder()
                    .name(format!("tag:{tag_key}"))
                    .set_values(Some(values.to_vec()))
                    .build(),
            )
            .filters(
                Filter::builder()
                    .name("instance-state-name")
                    .set_values(Some(states.iter().map(|s| s.to_string()).collect()))
                    .build(),
            )
            .into_paginator()
            .send();

        let mut ids = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(provider_error)?;
            for reservation in page.reservations() {
                for instance in reservation.instances() {
                    if let Some(id) = instance.instance_id() {
                        ids.push(id.to_string());
                    }
                }
            }
        }
        Ok(ids)
    }

    async fn create_tags(
        &self,
        ids: &[String],
        tags: &[(String, String)],
    ) -> Result<(), FleetError> {
        self.client
            .create_tags()
            .set_resources(Some(ids.to_vec()))
            .set_tags(Some(
                tags.iter()
                    .map(|(k, v)| Tag::builder().key(k).value(v).build())
                    .collect(),
            ))
            .send()
            .await
            .map_err(provider_error)?;
        Ok(())
    }

    async fn terminate_instances(&self, ids: &[String]) -> Result<(), FleetError> {
        match self
            .client
            .terminate_instances()
            .set_instance_ids(Some(ids.to_vec()))
            .send()
            .await
        {
            Ok(_) => Ok(()),
            // Ids that already disappeared keep terminate idempotent.
            Err(e) if e.code() == Some("InvalidInstanceID.NotFound") => {
                warn!("terminate: some instance ids no longer exist");
                Ok(())
            }
            Err(e) => Err(provider_error(e)),
        }
    }

    async fn ensure_placement_group(
        &self,
        name: &str,
        strategy: PlacementStrategy,
    ) -> Result<(), FleetError> {
        let aws_strategy = match strategy {
            PlacementStrategy::CoLocated => AwsPlacementStrategy::Cluster,
            PlacementStrategy::Partitioned => AwsPlacementStrategy::Partition,
            PlacementStrategy::Spread => AwsPlacementStrategy::Spread,
        };
        match self
            .client
            .create_placement_group()
            .group_name(name)
            .strategy(aws_strategy)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            // A sibling invocation may have created it first.
            Err(e) if e.code() == Some("InvalidPlacementGroup.Duplicate") => Ok(()),
            Err(e) => Err(provider_error(e)),
        }
    }

    async fn shape_offered(&self, shape: &str, subnet: &str) -> Result<bool, FleetError> {
        let az = self.subnet_az(subnet).await?;
        let resp = self
            .client
            .describe_instance_type_offerings()
            .location_type(aws_sdk_ec2::types::LocationType::AvailabilityZone)
            .filters(Filter::builder().name("location").values(az).build())
            .filters(Filter::builder().name("instance-type").values(shape).build())
            .send()
            .await
            .map_err(provider_error)?;
        Ok(!resp.instance_type_offerings().is_empty())
    }
}

#[async_trait]
impl burst_pricing::InstanceStateSource for Ec2Cloud {
    async fn instance_states(&self, ids: &[String]) -> Vec<(String, String)> {
        match CloudProvider::describe_instances(self, ids).await {
            Ok(statuses) => statuses.into_iter().map(|s| (s.id, s.state)).collect(),
            Err(e) => {
                warn!("interruption poll failed: {e}");
                Vec::new()
            }
        }
    }
}

fn provider_error<E, R>(err: SdkError<E, R>) -> FleetError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let transport = matches!(err, SdkError::TimeoutError(_) | SdkError::DispatchFailure(_));
    let recoverable = transport
        || err
            .code()
            .map(|code| RECOVERABLE_CODES.contains(&code))
            .unwrap_or(false);
    FleetError::Provider {
        recoverable,
        message: format!("{}", DisplayErrorContext(&err)),
    }
}
