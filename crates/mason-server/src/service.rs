use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::UnboundedSender;

use mason_core::{ExecutionResult, ResolvedArtifact};
use mason_index::{
    ContextBacking, IndexError, IndexHandle, IndexRegistry, RemoteIndexTransport,
    TransportError, UpdateSettings,
};
use mason_model::{ActivationEnvironment, ExplicitProfileSelection};
use mason_remote_proto::{
    IndexUpdateSettings, Request, RequestId, ResolverSettings, Response, RpcError, RpcErrorCode,
    RpcResult, ServerMessage, DEFAULT_CHUNK_SIZE,
};
use mason_resolve::{
    ModelResolver, NativeProjectHandle, ResolutionFacade, WorkspaceEnvironment,
};
use mason_scheduler::{CancellationToken, Scheduler, SchedulerConfig, TaskError};

/// Placeholder transport for deployments without a remote index endpoint;
/// every update attempt fails with a transport error.
pub struct UnconfiguredTransport;

impl RemoteIndexTransport for UnconfiguredTransport {
    fn fetch_delta(
        &self,
        _url: &str,
        _settings: &UpdateSettings,
        _since_generation: u64,
        _token: &CancellationToken,
    ) -> Result<mason_index::IndexDelta, TransportError> {
        Err(TransportError::Network {
            message: "no remote index transport is configured".to_string(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub scheduler: SchedulerConfig,
}

/// Cross-call server state and the request dispatcher.
///
/// The system-properties snapshot is taken once at construction; settings
/// and the workspace map are the only state `customize`/`reset` touch, so
/// `reset` is safe to call between unrelated sessions.
pub struct ResolutionService {
    scheduler: Scheduler,
    registry: IndexRegistry,
    facade: ResolutionFacade,
    transport: Arc<dyn RemoteIndexTransport>,
    settings: RwLock<ResolverSettings>,
    workspace: RwLock<BTreeMap<String, PathBuf>>,
    activation_snapshot: ActivationEnvironment,
    inflight: Mutex<HashMap<RequestId, CancellationToken>>,
}

impl ResolutionService {
    pub fn new(
        resolver: Arc<dyn ModelResolver>,
        transport: Arc<dyn RemoteIndexTransport>,
        config: ServiceConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            scheduler: Scheduler::new(config.scheduler),
            registry: IndexRegistry::new(),
            facade: ResolutionFacade::new(resolver),
            transport,
            settings: RwLock::new(ResolverSettings::default()),
            workspace: RwLock::new(BTreeMap::new()),
            activation_snapshot: ActivationEnvironment::snapshot(),
            inflight: Mutex::new(HashMap::new()),
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Signal the token bound to an in-flight request. Unknown ids are a
    /// no-op: the request may have completed concurrently.
    pub fn cancel(&self, id: RequestId) -> bool {
        match self.inflight.lock().get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn workspace_env(&self) -> WorkspaceEnvironment {
        let settings = self.settings.read();
        WorkspaceEnvironment {
            user_settings: settings.user_settings.clone(),
            global_settings: settings.global_settings.clone(),
            activation: self.activation_snapshot.clone(),
        }
    }

    /// Dispatch one request to its terminal result. Configuration calls run
    /// inline; everything else occupies one worker for its duration, with
    /// the binding registered in the in-flight table so `cancelRequest` can
    /// reach it.
    pub async fn handle(
        self: &Arc<Self>,
        id: RequestId,
        request: Request,
        outbound: UnboundedSender<ServerMessage>,
    ) -> RpcResult {
        match request {
            Request::CancelRequest { id: target } => {
                self.cancel(target);
                ok(Response::Ok)
            }
            Request::Customize {
                settings,
                workspace,
            } => {
                *self.settings.write() = settings;
                *self.workspace.write() = workspace;
                ok(Response::Ok)
            }
            Request::Reset => {
                *self.settings.write() = ResolverSettings::default();
                self.workspace.write().clear();
                self.facade.clear_caches();
                ok(Response::Ok)
            }
            Request::ClearCaches => {
                self.facade.clear_caches();
                ok(Response::Ok)
            }
            Request::ClearCachesFor { project_id } => {
                self.facade.clear_caches_for(&project_id);
                ok(Response::Ok)
            }
            Request::Shutdown => ok(Response::Ok),
            request => self.run_job(id, request, outbound).await,
        }
    }

    async fn run_job(
        self: &Arc<Self>,
        id: RequestId,
        request: Request,
        outbound: UnboundedSender<ServerMessage>,
    ) -> RpcResult {
        let token = CancellationToken::new();
        self.inflight.lock().insert(id, token.clone());

        let cancelled_shape = cancelled_response(&request);
        let service = Arc::clone(self);
        let task = self.scheduler.spawn(token, move |token| {
            Ok(service.execute_request(id, request, &token, &outbound))
        });
        let result = task.join().await;
        self.inflight.lock().remove(&id);

        match result {
            Ok(result) => result,
            Err(TaskError::Cancelled) => match cancelled_shape {
                Some(response) => ok(response),
                None => rpc_err(RpcErrorCode::Internal, "request cancelled"),
            },
            Err(err) => rpc_err(RpcErrorCode::Internal, err.to_string()),
        }
    }

    /// Runs on a worker thread.
    fn execute_request(
        &self,
        id: RequestId,
        request: Request,
        token: &CancellationToken,
        outbound: &UnboundedSender<ServerMessage>,
    ) -> RpcResult {
        match request {
            Request::ResolveProject {
                descriptor,
                active_profiles,
                inactive_profiles,
            } => {
                let selection =
                    ExplicitProfileSelection::from_lists(active_profiles, inactive_profiles);
                let result = self.facade.resolve_project(
                    &descriptor,
                    &selection,
                    &self.workspace_env(),
                    token,
                );
                ok(Response::Project { result })
            }
            Request::Resolve {
                coordinate,
                repositories,
            } => {
                // In-workspace artifacts resolve straight to their
                // descriptor from the workspace map, bypassing the
                // resolver.
                let key = format!(
                    "{}:{}:{}",
                    coordinate.group_id, coordinate.artifact_id, coordinate.version
                );
                if let Some(descriptor) = self.workspace.read().get(&key).cloned() {
                    return ok(Response::Artifact {
                        result: ExecutionResult::success(ResolvedArtifact::resolved(
                            coordinate, descriptor,
                        )),
                    });
                }
                let artifact = self.facade.resolve(&coordinate, &repositories);
                ok(Response::Artifact {
                    result: ExecutionResult::success(artifact),
                })
            }
            Request::ResolveTransitively {
                coordinates,
                repositories,
            } => {
                let result =
                    self.facade
                        .resolve_transitively(&coordinates, &repositories, token);
                ok(Response::Artifacts { result })
            }
            Request::ResolvePlugin {
                plugin,
                repositories,
                project_handle,
                transitive,
            } => {
                let result = self.facade.resolve_plugin(
                    &plugin,
                    &repositories,
                    NativeProjectHandle(project_handle),
                    transitive,
                    token,
                );
                let result = match result {
                    ExecutionResult::Success {
                        payload,
                        problems,
                        unresolved,
                    } => ExecutionResult::Success {
                        payload: payload.into_iter().collect(),
                        problems,
                        unresolved,
                    },
                    ExecutionResult::Cancelled => ExecutionResult::Cancelled,
                    ExecutionResult::Error { message } => ExecutionResult::Error { message },
                };
                ok(Response::Artifacts { result })
            }
            Request::Execute {
                descriptor,
                active_profiles,
                inactive_profiles,
                goals,
                selected_modules,
                make_flags,
            } => {
                let selection =
                    ExplicitProfileSelection::from_lists(active_profiles, inactive_profiles);
                let result = self.facade.execute(
                    &descriptor,
                    &selection,
                    &goals,
                    &selected_modules,
                    &make_flags,
                    &self.workspace_env(),
                    token,
                );
                ok(Response::GoalRun { result })
            }
            Request::RetrieveAvailableVersions {
                group_id,
                artifact_id,
                repositories,
            } => {
                let versions =
                    self.facade
                        .available_versions(&group_id, &artifact_id, &repositories);
                ok(Response::Versions { versions })
            }
            Request::CreateIndex {
                index_id,
                repository_id,
                local_path,
                remote_url,
            } => match self
                .registry
                .create_index(index_id, repository_id, local_path, remote_url)
            {
                Ok(handle) => ok(Response::IndexCreated { handle: handle.0 }),
                Err(err) => RpcResult::Err {
                    error: index_error(err),
                },
            },
            Request::ReleaseIndex { handle } => {
                match self.registry.release_index(IndexHandle(handle)) {
                    Ok(()) => ok(Response::Ok),
                    Err(err) => RpcResult::Err {
                        error: index_error(err),
                    },
                }
            }
            Request::UpdateIndex { handle, settings } => {
                self.update_index(IndexHandle(handle), settings, token)
            }
            Request::ProcessArtifacts { handle, chunk_size } => {
                let chunk_size = chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
                let outcome =
                    self.registry
                        .process_artifacts(IndexHandle(handle), chunk_size, |artifacts| {
                            let _ = outbound.send(ServerMessage::ArtifactChunk { id, artifacts });
                        });
                match outcome {
                    Ok(()) => ok(Response::Ok),
                    Err(err) => RpcResult::Err {
                        error: index_error(err),
                    },
                }
            }
            Request::AddArtifact { handle, file } => {
                match self.registry.add_artifact(IndexHandle(handle), &file) {
                    Ok(coordinate) => ok(Response::ArtifactAdded { coordinate }),
                    Err(err) => RpcResult::Err {
                        error: index_error(err),
                    },
                }
            }
            Request::Search {
                handle,
                query,
                max_results,
            } => match self.registry.search(IndexHandle(handle), &query, max_results) {
                Ok(artifacts) => ok(Response::SearchResults { artifacts }),
                Err(err) => RpcResult::Err {
                    error: index_error(err),
                },
            },
            // Configuration requests are handled before job dispatch.
            _ => rpc_err(
                RpcErrorCode::InvalidRequest,
                "request is not a worker job",
            ),
        }
    }

    /// `updateIndex` routes on the context backing: local contexts rescan
    /// the repository, remote contexts fetch an incremental delta with the
    /// per-call settings.
    fn update_index(
        &self,
        handle: IndexHandle,
        settings: IndexUpdateSettings,
        token: &CancellationToken,
    ) -> RpcResult {
        let context = match self.registry.context(handle) {
            Ok(context) => context,
            Err(err) => {
                return RpcResult::Err {
                    error: index_error(err),
                }
            }
        };

        let progress = self
            .scheduler
            .progress()
            .start(format!("Updating index {}", context.index_id()));

        let outcome = match context.backing() {
            ContextBacking::Local(_) => self.registry.scan(handle, token, &progress),
            ContextBacking::Remote(_) => self.registry.update(
                handle,
                self.transport.as_ref(),
                &UpdateSettings {
                    username: settings.username,
                    password: settings.password,
                    force_full_update: settings.force_full_update,
                },
                token,
                &progress,
            ),
        };

        match outcome {
            Ok(count) => ok(Response::IndexUpdated {
                result: ExecutionResult::success(count),
            }),
            Err(IndexError::Cancelled) => ok(Response::IndexUpdated {
                result: ExecutionResult::Cancelled,
            }),
            Err(err) => RpcResult::Err {
                error: index_error(err),
            },
        }
    }
}

fn ok(response: Response) -> RpcResult {
    RpcResult::Ok { response }
}

fn rpc_err(code: RpcErrorCode, message: impl Into<String>) -> RpcResult {
    RpcResult::Err {
        error: RpcError::new(code, message),
    }
}

/// Shape a harness-driven cancellation into the method's cancelled result.
/// Methods without an `ExecutionResult`-shaped response report a generic
/// cancellation error instead.
fn cancelled_response(request: &Request) -> Option<Response> {
    match request {
        Request::ResolveProject { .. } => Some(Response::Project {
            result: ExecutionResult::Cancelled,
        }),
        Request::Resolve { .. } => Some(Response::Artifact {
            result: ExecutionResult::Cancelled,
        }),
        Request::ResolveTransitively { .. } | Request::ResolvePlugin { .. } => {
            Some(Response::Artifacts {
                result: ExecutionResult::Cancelled,
            })
        }
        Request::Execute { .. } => Some(Response::GoalRun {
            result: ExecutionResult::Cancelled,
        }),
        Request::UpdateIndex { .. } => Some(Response::IndexUpdated {
            result: ExecutionResult::Cancelled,
        }),
        _ => None,
    }
}

fn index_error(err: IndexError) -> RpcError {
    let code = match &err {
        IndexError::UnknownHandle { .. } => RpcErrorCode::UnknownHandle,
        IndexError::InvalidContext { .. } | IndexError::NotLocal | IndexError::NotRemote => {
            RpcErrorCode::InvalidRequest
        }
        IndexError::Io { .. } => RpcErrorCode::IndexerError,
        IndexError::Transport { .. } => RpcErrorCode::TransportError,
        IndexError::Cancelled => RpcErrorCode::Internal,
    };
    RpcError::new(code, err.to_string())
}
