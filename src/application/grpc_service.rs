use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

use super::mappers::{self, letsmodel, ModelBuilder};
use crate::domain::model::Model;
use crate::domain::solver_service::{SolverError, SolverService};
use crate::domain::value_objects::ProblemFormat;
use crate::domain::writer_service::{WriterError, WriterOptions};
use crate::solver::SolverFactory;
use crate::writers::WriterFactory;

fn writer_status(error: WriterError) -> Status {
    match error {
        WriterError::Io(e) => Status::internal(format!("Writer error: {}", e)),
        other => Status::invalid_argument(other.to_string()),
    }
}

fn solver_status(error: SolverError) -> Status {
    match error {
        SolverError::InvalidModel(_) | SolverError::Model(_) => {
            Status::invalid_argument(error.to_string())
        }
        SolverError::SolverNotAvailable(_) => Status::unavailable(error.to_string()),
        other => Status::internal(format!("Solver error: {}", other)),
    }
}

/// gRPC service implementation
pub struct GrpcModelService {
    default_format: ProblemFormat,
    solver: Arc<dyn SolverService>,
}

impl GrpcModelService {
    pub fn new(default_format: ProblemFormat, solver: Arc<dyn SolverService>) -> Self {
        Self {
            default_format,
            solver,
        }
    }

    fn write(
        &self,
        model: Model,
        format: &str,
        options_json: &str,
    ) -> Result<letsmodel::WriteResponse, Status> {
        let format = mappers::proto_to_format(format, self.default_format).map_err(|e| *e)?;
        let options = WriterOptions::from_json(options_json).map_err(writer_status)?;

        info!(model = model.name(), %format, "writing model");
        let written = WriterFactory::create(format)
            .render(&model, &options)
            .map_err(writer_status)?;
        debug!(bytes = written.contents.len(), symbols = written.symbol_map.len(), "model written");

        mappers::domain_to_proto_written(&model, format, written).map_err(|e| *e)
    }
}

#[tonic::async_trait]
impl letsmodel::model_service_server::ModelService for GrpcModelService {
    async fn write_model(
        &self,
        request: Request<letsmodel::WriteRequest>,
    ) -> Result<Response<letsmodel::WriteResponse>, Status> {
        let request = request.into_inner();
        let proto_model = request
            .model
            .ok_or_else(|| Status::invalid_argument("Request has no model"))?;
        let model = mappers::proto_to_domain_model(&proto_model).map_err(|e| *e)?;

        let response = self.write(model, &request.format, &request.options_json)?;
        Ok(Response::new(response))
    }

    async fn write_model_stream(
        &self,
        request: Request<tonic::Streaming<letsmodel::ModelChunk>>,
    ) -> Result<Response<letsmodel::WriteResponse>, Status> {
        use letsmodel::model_chunk::Chunk;

        let mut stream = request.into_inner();
        let mut builder: Option<ModelBuilder> = None;
        let mut format = String::new();
        let mut options_json = String::new();
        let mut chunks = 0usize;

        // Components are added as they arrive so later chunks can refer to them
        while let Some(chunk) = stream.message().await? {
            chunks += 1;
            let Some(chunk) = chunk.chunk else {
                continue;
            };
            let current = match chunk {
                Chunk::Metadata(metadata) => {
                    if builder.is_some() {
                        return Err(Status::invalid_argument(
                            "Metadata must be the first chunk of the stream",
                        ));
                    }
                    builder = Some(ModelBuilder::new(&metadata.model_name));
                    format = metadata.format;
                    options_json = metadata.options_json;
                    continue;
                }
                other => (builder.get_or_insert_with(|| ModelBuilder::new("unknown")), other),
            };
            let added = match current {
                (builder, Chunk::Variable(v)) => builder.add_variable(&v).map(|_| ()),
                (builder, Chunk::Parameter(p)) => builder.add_parameter(&p).map(|_| ()),
                (builder, Chunk::Constraint(c)) => builder.add_constraint(&c).map(|_| ()),
                (builder, Chunk::Objective(o)) => builder.add_objective(&o).map(|_| ()),
                (builder, Chunk::Suffix(s)) => builder.add_suffix(&s),
                (_, Chunk::Metadata(_)) => Ok(()),
            };
            added.map_err(|e| *e)?;
        }

        let builder = builder.ok_or_else(|| Status::invalid_argument("Empty model stream"))?;
        debug!(chunks, model = builder.model().name(), "model stream received");
        let response = self.write(builder.finish(), &format, &options_json)?;
        Ok(Response::new(response))
    }

    async fn solve_model(
        &self,
        request: Request<letsmodel::SolveRequest>,
    ) -> Result<Response<letsmodel::SolveResponse>, Status> {
        let request = request.into_inner();
        let proto_model = request
            .model
            .ok_or_else(|| Status::invalid_argument("Request has no model"))?;
        let model = mappers::proto_to_domain_model(&proto_model).map_err(|e| *e)?;

        let solver = if request.solver.trim().is_empty() {
            Arc::clone(&self.solver)
        } else {
            SolverFactory::create(&request.solver).map_err(solver_status)?
        };
        info!(model = model.name(), solver = solver.name(), "solving model");

        let results = solver.solve(&model).map_err(solver_status)?;
        let response = mappers::domain_to_proto_results(&model, results).map_err(|e| *e)?;
        Ok(Response::new(response))
    }

    async fn list_formats(
        &self,
        _request: Request<letsmodel::Empty>,
    ) -> Result<Response<letsmodel::FormatList>, Status> {
        let formats = ProblemFormat::ALL
            .iter()
            .map(|format| letsmodel::FormatInfo {
                name: format!("{:?}", format).to_lowercase(),
                extension: format.extension().to_string(),
                description: format.to_string(),
            })
            .collect();

        let mut solvers = Vec::new();
        for name in ["highs", "cbc"] {
            if let Ok(solver) = SolverFactory::create(name) {
                solvers.push(solver.name().to_string());
            }
        }

        Ok(Response::new(letsmodel::FormatList { formats, solvers }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use letsmodel::model_service_server::ModelService;
    use letsmodel::expression::Node;

    fn var(name: &str) -> letsmodel::Expression {
        letsmodel::Expression {
            node: Some(Node::Variable(name.to_string())),
        }
    }

    fn service() -> GrpcModelService {
        GrpcModelService::new(ProblemFormat::Lp, SolverFactory::default_solver().unwrap())
    }

    fn small_model() -> letsmodel::Model {
        letsmodel::Model {
            name: "small".to_string(),
            variables: vec![letsmodel::Variable {
                name: "x".to_string(),
                domain: letsmodel::variable::Domain::NonNegativeReals as i32,
                upper_bound: Some(4.0),
                ..Default::default()
            }],
            objectives: vec![letsmodel::Objective {
                name: "obj".to_string(),
                expression: Some(var("x")),
                sense: letsmodel::objective::Sense::Maximize as i32,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn write_model_returns_contents_and_symbols() {
        let response = service()
            .write_model(Request::new(letsmodel::WriteRequest {
                model: Some(small_model()),
                format: "lp".to_string(),
                options_json: r#"{"symbolic_solver_labels": true}"#.to_string(),
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.format, "lp");
        assert!(response.contents.starts_with("\\* Source model name=small *\\"));
        assert!(response
            .symbols
            .iter()
            .any(|s| s.symbol == "x" && s.component == "x"));
    }

    #[tokio::test]
    async fn invalid_options_are_rejected() {
        let status = service()
            .write_model(Request::new(letsmodel::WriteRequest {
                model: Some(small_model()),
                format: "lp".to_string(),
                options_json: r#"{"colour": "blue"}"#.to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn solve_model_reports_values_by_name() {
        let response = service()
            .solve_model(Request::new(letsmodel::SolveRequest {
                model: Some(small_model()),
                solver: String::new(),
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.termination_condition, "Optimal");
        assert!((response.best_feasible_objective.unwrap() - 4.0).abs() < 1e-6);
        assert_eq!(response.values.len(), 1);
        assert_eq!(response.values[0].name, "x");
    }
}
