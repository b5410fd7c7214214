//! Command routing for dispatch.
//!
//! The dispatcher maps each decoded [`Request`] onto the registry and the
//! worker supervisor. Exited workers are reaped before every command so that
//! listings and lookups never report a dead volume.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use btrmount_protocol::{InstanceId, RawMountOptions, Reply, Request};
use uuid::Uuid;

use crate::health::HealthReporter;
use crate::registry::VolumeRegistry;
use crate::supervisor::WorkerLauncher;

use super::errors::DispatchError;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Routes requests to registry and supervisor operations.
pub(crate) struct CommandDispatcher {
    launcher: Arc<dyn WorkerLauncher>,
    reporter: Arc<dyn HealthReporter>,
    stop_timeout: Duration,
}

impl CommandDispatcher {
    pub(crate) fn new(
        launcher: Arc<dyn WorkerLauncher>,
        reporter: Arc<dyn HealthReporter>,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            launcher,
            reporter,
            stop_timeout,
        }
    }

    /// Produces the reply for one request.
    ///
    /// Request failures are rendered as `Error` replies; this never fails.
    pub(crate) fn dispatch(&self, request: Request, registry: &mut VolumeRegistry) -> Reply {
        for reaped in registry.reap_exited() {
            self.reporter.worker_exited(reaped.instance, &reaped.exit);
        }
        debug!(
            target: DISPATCH_TARGET,
            kind = request.kind(),
            volumes = registry.len(),
            "dispatching request"
        );
        match self.route(request, registry) {
            Ok(reply) => reply,
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "request rejected");
                Reply::error(error.to_string())
            }
        }
    }

    fn route(
        &self,
        request: Request,
        registry: &mut VolumeRegistry,
    ) -> Result<Reply, DispatchError> {
        match request {
            Request::Mount(options) => self.mount(options, registry),
            Request::List => Ok(Reply::Listing(registry.records())),
            Request::DrvMountData { instance } => {
                let instance = instance.ok_or(DispatchError::missing_field("InstanceID"))?;
                let entry = registry
                    .get(instance)
                    .ok_or(DispatchError::UnknownInstance { instance })?;
                Ok(Reply::Detail(entry.to_record()))
            }
            Request::DrvMounted {
                instance,
                fs_uuid,
                label,
            } => {
                let instance = instance.ok_or(DispatchError::missing_field("InstanceID"))?;
                let fs_uuid = fs_uuid.ok_or(DispatchError::missing_field("FSUUID"))?;
                mounted(registry, instance, fs_uuid, label)
            }
            Request::Unmount {
                instance,
                mount_point,
            } => self.unmount(registry, instance, mount_point),
            Request::Unknown(_) => Err(DispatchError::UnknownCommand),
        }
    }

    fn mount(
        &self,
        options: RawMountOptions,
        registry: &mut VolumeRegistry,
    ) -> Result<Reply, DispatchError> {
        let options = options.build()?;
        if let Some(existing) = registry.find_by_mount_point(options.mount_point()) {
            return Err(DispatchError::MountPointInUse {
                mount_point: options.mount_point().to_owned(),
                instance: existing.instance(),
            });
        }
        let launched = registry.register(options, |instance, options| {
            self.launcher.launch(instance, options)
        });
        match launched {
            Ok(instance) => {
                let pid = registry
                    .get(instance)
                    .map(|entry| entry.worker_pid())
                    .unwrap_or_default();
                self.reporter.worker_started(instance, pid);
                Ok(Reply::Ok)
            }
            Err(error) => {
                self.reporter.worker_failed(&error);
                Err(error.into())
            }
        }
    }

    fn unmount(
        &self,
        registry: &mut VolumeRegistry,
        instance: Option<InstanceId>,
        mount_point: Option<String>,
    ) -> Result<Reply, DispatchError> {
        let instance = match (instance, mount_point) {
            (Some(instance), _) => instance,
            (None, Some(mount_point)) => registry
                .find_by_mount_point(&mount_point)
                .map(|entry| entry.instance())
                .ok_or(DispatchError::UnknownMountPoint { mount_point })?,
            (None, None) => return Err(DispatchError::missing_field("InstanceID or MountPoint")),
        };
        let mut entry = registry
            .remove(instance)
            .ok_or(DispatchError::UnknownInstance { instance })?;
        info!(
            target: DISPATCH_TARGET,
            %instance,
            state = %entry.state(),
            mount_point = entry.options().mount_point(),
            "unmounting volume"
        );
        match entry.worker_mut().stop(self.stop_timeout) {
            Ok(exit) => self.reporter.worker_exited(instance, &exit),
            Err(error) => warn!(
                target: DISPATCH_TARGET,
                %instance,
                %error,
                "failed to stop worker"
            ),
        }
        Ok(Reply::Ok)
    }
}

fn mounted(
    registry: &mut VolumeRegistry,
    instance: InstanceId,
    fs_uuid: Uuid,
    label: Option<String>,
) -> Result<Reply, DispatchError> {
    if !registry.mark_mounted(instance, fs_uuid, label) {
        return Err(DispatchError::UnknownInstance { instance });
    }
    info!(
        target: DISPATCH_TARGET,
        %instance,
        fs_uuid = %fs_uuid,
        "worker reported mounted filesystem"
    );
    Ok(Reply::Ok)
}
