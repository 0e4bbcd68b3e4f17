// Application layer: gRPC use cases over the domain services

pub mod grpc_service;
pub mod mappers;

pub use grpc_service::GrpcModelService;
pub use mappers::letsmodel;
