// Infrastructure: Server setup and configuration
// Single Responsibility: Manage server lifecycle and configuration

use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server;
use tracing::info;

use crate::application::letsmodel::model_service_server::ModelServiceServer;
use crate::application::GrpcModelService;
use crate::domain::solver_service::SolverService;
use crate::domain::value_objects::ProblemFormat;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

pub struct ServerConfig {
    pub address: SocketAddr,
    pub solver: Arc<dyn SolverService>,
    /// Format used when a request does not name one
    pub default_format: ProblemFormat,
}

impl ServerConfig {
    pub fn new(address: SocketAddr, solver: Arc<dyn SolverService>) -> Self {
        Self {
            address,
            solver,
            default_format: ProblemFormat::Lp,
        }
    }

    pub fn with_default_format(mut self, format: ProblemFormat) -> Self {
        self.default_format = format;
        self
    }
}

pub async fn start_server(config: ServerConfig) -> Result<(), ServerError> {
    info!(
        address = %config.address,
        solver = config.solver.name(),
        default_format = %config.default_format,
        "letsmodel server listening"
    );
    let service = GrpcModelService::new(config.default_format, config.solver);

    Server::builder()
        .add_service(ModelServiceServer::new(service))
        .serve(config.address)
        .await?;

    Ok(())
}
