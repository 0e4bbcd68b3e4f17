// Example: facility location sent to the model service as a stream
//
// A logistics company decides which warehouses to open and how to route
// shipments to its customers.
//
// Problem: 10 warehouses, 30 customers
// Variables: 10 binary (open/close) + 300 continuous (shipments) = 310 total
// Constraints: 30 (demand) + 10 (capacity) = 40 total
//
// Every component travels as its own chunk, so the model never has to fit
// in a single message. The server answers with a GAMS file.

use futures::stream;
use tonic::Request;

pub mod letsmodel {
    tonic::include_proto!("letsmodel");
}

use letsmodel::{
    expression::Node, model_chunk::Chunk, model_service_client::ModelServiceClient,
    objective::Sense, variable::Domain, BinaryOp, Constraint, Expression, ExpressionList,
    Metadata, ModelChunk, Objective, Variable,
};

const NUM_WAREHOUSES: usize = 10;
const NUM_CUSTOMERS: usize = 30;

fn constant(value: f64) -> Expression {
    Expression {
        node: Some(Node::Constant(value)),
    }
}

fn var(name: &str) -> Expression {
    Expression {
        node: Some(Node::Variable(name.to_string())),
    }
}

fn term(coef: f64, name: &str) -> Expression {
    Expression {
        node: Some(Node::Product(
            BinaryOp {
                left: Some(constant(coef).into()),
                right: Some(var(name).into()),
            }
            .into(),
        )),
    }
}

fn sum(terms: Vec<Expression>) -> Expression {
    Expression {
        node: Some(Node::Sum(ExpressionList { terms }.into())),
    }
}

fn chunk(chunk: Chunk) -> ModelChunk {
    ModelChunk { chunk: Some(chunk) }
}

fn open(w: usize) -> String {
    format!("open_{}", w + 1)
}

fn ship(w: usize, c: usize) -> String {
    format!("ship_{}_{}", w + 1, c + 1)
}

/// (fixed cost, capacity) per warehouse
fn warehouses() -> Vec<(f64, f64)> {
    (0..NUM_WAREHOUSES)
        .map(|w| (10_000.0 + 1_500.0 * w as f64, 120.0 + 10.0 * (w % 4) as f64))
        .collect()
}

fn demand(c: usize) -> f64 {
    15.0 + (c % 7) as f64 * 5.0
}

fn shipping_cost(w: usize, c: usize) -> f64 {
    7.0 + ((w * 7 + c * 3) % 11) as f64
}

fn create_chunks() -> Vec<ModelChunk> {
    let warehouses = warehouses();
    let mut chunks = vec![chunk(Chunk::Metadata(Metadata {
        model_name: "facility_location".to_string(),
        format: "gams".to_string(),
        options_json: r#"{"symbolic_solver_labels": true, "solver": "cbc"}"#.to_string(),
    }))];

    for w in 0..NUM_WAREHOUSES {
        chunks.push(chunk(Chunk::Variable(Variable {
            name: open(w),
            domain: Domain::Binary as i32,
            ..Default::default()
        })));
        for c in 0..NUM_CUSTOMERS {
            chunks.push(chunk(Chunk::Variable(Variable {
                name: ship(w, c),
                domain: Domain::NonNegativeReals as i32,
                ..Default::default()
            })));
        }
    }

    for c in 0..NUM_CUSTOMERS {
        let shipped = (0..NUM_WAREHOUSES).map(|w| var(&ship(w, c))).collect();
        chunks.push(chunk(Chunk::Constraint(Constraint {
            name: format!("demand_{}", c + 1),
            lower: Some(constant(demand(c))),
            body: Some(sum(shipped)),
            ..Default::default()
        })));
    }

    // sum_c ship[w, c] - capacity[w] * open[w] <= 0
    for (w, (_, capacity)) in warehouses.iter().enumerate() {
        let mut terms: Vec<Expression> = (0..NUM_CUSTOMERS).map(|c| var(&ship(w, c))).collect();
        terms.push(term(-capacity, &open(w)));
        chunks.push(chunk(Chunk::Constraint(Constraint {
            name: format!("capacity_{}", w + 1),
            body: Some(sum(terms)),
            upper: Some(constant(0.0)),
            ..Default::default()
        })));
    }

    let mut cost = Vec::new();
    for (w, (fixed, _)) in warehouses.iter().enumerate() {
        cost.push(term(*fixed, &open(w)));
        for c in 0..NUM_CUSTOMERS {
            cost.push(term(shipping_cost(w, c), &ship(w, c)));
        }
    }
    chunks.push(chunk(Chunk::Objective(Objective {
        name: "total_cost".to_string(),
        expression: Some(sum(cost)),
        sense: Sense::Minimize as i32,
        ..Default::default()
    })));

    chunks
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = ModelServiceClient::connect("http://127.0.0.1:50051").await?;

    let chunks = create_chunks();
    println!("Sending {} chunks...\n", chunks.len());

    let response = client
        .write_model_stream(Request::new(stream::iter(chunks)))
        .await?
        .into_inner();

    println!(
        "Received a {} file: {} lines, {} symbols",
        response.format,
        response.contents.lines().count(),
        response.symbols.len()
    );
    for line in response.contents.lines().take(20) {
        println!("  {}", line);
    }

    Ok(())
}
