//! Instance lifecycle operations for one project.
//!
//! Every method maps onto a single Compute Engine call (list calls follow
//! page tokens, creation first resolves the boot image). Mutations return the
//! [`Operation`] handle without waiting; pass it to [`InstanceOperations::wait`]
//! to block until it finishes.

use tracing::info;

use crate::backend::{ComputeBackend, InstanceAction};
use crate::compute::ComputeError;
use crate::compute::model::Operation;
use crate::instance_config::{InstanceConfig, InstanceRequest, InstanceTemplate};
use crate::parser::{ParsedInstance, parse_instance, parse_instances};
use crate::wait::{OperationWaiter, WaitPolicy};

/// Instance operations bound to a backend and a project.
#[derive(Clone, Debug)]
pub struct InstanceOperations<B> {
    backend: B,
    project: String,
    template: InstanceTemplate,
    waiter: OperationWaiter,
}

impl<B: ComputeBackend> InstanceOperations<B> {
    /// Creates operations with the default template and wait policy.
    #[must_use]
    pub fn new(backend: B, project: impl Into<String>) -> Self {
        Self {
            backend,
            project: project.into(),
            template: InstanceTemplate::default(),
            waiter: OperationWaiter::default(),
        }
    }

    /// Replaces the creation template.
    #[must_use]
    pub fn with_template(mut self, template: InstanceTemplate) -> Self {
        self.template = template;
        self
    }

    /// Replaces the wait policy.
    #[must_use]
    pub const fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.waiter = OperationWaiter::new(policy);
        self
    }

    /// Returns the project the operations act on.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Returns the underlying backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Lists the zone names visible to the project.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the call fails.
    pub async fn list_zones(&self) -> Result<Vec<String>, ComputeError> {
        self.backend.list_zones(&self.project).await
    }

    /// Lists and flattens the instances of a zone.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the call fails and
    /// [`ComputeError::MalformedResponse`] for an incomplete record.
    pub async fn list_instances(&self, zone: &str) -> Result<Vec<ParsedInstance>, ComputeError> {
        let instances = self.backend.list_instances(&self.project, zone).await?;
        parse_instances(&instances, &self.project)
    }

    /// Fetches and flattens one instance.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the call fails (for example a 404 for an
    /// unknown name) and [`ComputeError::MalformedResponse`] for an incomplete
    /// record.
    pub async fn get_instance(&self, zone: &str, name: &str) -> Result<ParsedInstance, ComputeError> {
        let instance = self.backend.get_instance(&self.project, zone, name).await?;
        parse_instance(&instance, &self.project)
    }

    /// Builds the creation payload, resolving the boot image and loading the
    /// startup script.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the image lookup fails,
    /// [`ComputeError::MalformedResponse`] when the image has no `selfLink`, and
    /// [`ComputeError::StartupScript`] when the script cannot be loaded.
    pub async fn instance_config(
        &self,
        request: &InstanceRequest,
    ) -> Result<InstanceConfig, ComputeError> {
        let image = self
            .backend
            .get_image_from_family(&self.template.image_project, &self.template.image_family)
            .await?;
        let source_image = image
            .self_link
            .ok_or_else(|| ComputeError::malformed("image.selfLink"))?;
        let script = self.template.startup_script.load()?;
        Ok(self.template.build(request, &source_image, script))
    }

    /// Submits the creation of an instance.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::instance_config`] or the insert call.
    pub async fn create_instance(&self, request: &InstanceRequest) -> Result<Operation, ComputeError> {
        let config = self.instance_config(request).await?;
        info!(
            project = %self.project,
            zone = %request.zone,
            instance = %request.name,
            local_ssd = request.has_local_disk,
            "creating instance"
        );
        self.backend
            .insert_instance(&self.project, &request.zone, &config)
            .await
    }

    /// Submits the deletion of an instance.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the call fails.
    pub async fn delete_instance(&self, zone: &str, name: &str) -> Result<Operation, ComputeError> {
        info!(project = %self.project, zone, instance = name, "deleting instance");
        self.backend.delete_instance(&self.project, zone, name).await
    }

    /// Submits a start.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the call fails.
    pub async fn start_instance(&self, zone: &str, name: &str) -> Result<Operation, ComputeError> {
        self.act(zone, name, InstanceAction::Start).await
    }

    /// Submits a stop.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the call fails.
    pub async fn stop_instance(&self, zone: &str, name: &str) -> Result<Operation, ComputeError> {
        self.act(zone, name, InstanceAction::Stop).await
    }

    /// Submits a suspend. Local SSD contents are always discarded.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the call fails.
    pub async fn suspend_instance(&self, zone: &str, name: &str) -> Result<Operation, ComputeError> {
        self.act(
            zone,
            name,
            InstanceAction::Suspend {
                discard_local_ssd: true,
            },
        )
        .await
    }

    /// Submits a resume.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the call fails.
    pub async fn resume_instance(&self, zone: &str, name: &str) -> Result<Operation, ComputeError> {
        self.act(zone, name, InstanceAction::Resume).await
    }

    /// Waits for an operation in `zone` to finish.
    ///
    /// # Errors
    ///
    /// See [`OperationWaiter::wait`].
    pub async fn wait(&self, zone: &str, operation: &Operation) -> Result<Operation, ComputeError> {
        self.waiter
            .wait(&self.backend, &self.project, zone, &operation.name)
            .await
    }

    async fn act(
        &self,
        zone: &str,
        name: &str,
        action: InstanceAction,
    ) -> Result<Operation, ComputeError> {
        info!(project = %self.project, zone, instance = name, %action, "changing instance state");
        self.backend
            .perform_action(&self.project, zone, name, action)
            .await
    }
}
