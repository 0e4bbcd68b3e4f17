// Example client for the model service
//
// Production planning: chairs and tables
// - Each chair takes 2 hours of labor and yields $30 profit
// - Each table takes 3 hours of labor and yields $50 profit
// - 100 hours of labor are available, storage holds 40 units
//
// Maximize: 30*chairs + 50*tables
// Subject to:
//   2*chairs + 3*tables <= 100  (labor)
//   chairs + tables <= 40       (storage)
//
// The model is first written as a CPLEX LP file, then solved in process.

use tonic::Request;

pub mod letsmodel {
    tonic::include_proto!("letsmodel");
}

use letsmodel::{
    expression::Node, model_service_client::ModelServiceClient, objective::Sense,
    variable::Domain, BinaryOp, Constraint, Empty, Expression, ExpressionList, Model, Objective,
    SolveRequest, Variable, WriteRequest,
};

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

fn at_most(name: &str, body: Expression, upper: f64) -> Constraint {
    Constraint {
        name: name.to_string(),
        body: Some(body),
        upper: Some(constant(upper)),
        ..Default::default()
    }
}

fn planning_model() -> Model {
    let variable = |name: &str| Variable {
        name: name.to_string(),
        domain: Domain::NonNegativeReals as i32,
        ..Default::default()
    };

    Model {
        name: "production".to_string(),
        variables: vec![variable("chairs"), variable("tables")],
        constraints: vec![
            at_most(
                "labor",
                sum(vec![term(2.0, "chairs"), term(3.0, "tables")]),
                100.0,
            ),
            at_most("storage", sum(vec![var("chairs"), var("tables")]), 40.0),
        ],
        objectives: vec![Objective {
            name: "profit".to_string(),
            expression: Some(sum(vec![term(30.0, "chairs"), term(50.0, "tables")])),
            sense: Sense::Maximize as i32,
            ..Default::default()
        }],
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = ModelServiceClient::connect("http://127.0.0.1:50051").await?;

    let formats = client.list_formats(Request::new(Empty {})).await?.into_inner();
    println!("Formats:");
    for format in &formats.formats {
        println!("  {:<6} .{:<4} {}", format.name, format.extension, format.description);
    }
    println!("Solvers: {}\n", formats.solvers.join(", "));

    let written = client
        .write_model(Request::new(WriteRequest {
            model: Some(planning_model()),
            format: "lp".to_string(),
            options_json: r#"{"symbolic_solver_labels": true}"#.to_string(),
        }))
        .await?
        .into_inner();

    println!("=== {} file ===\n{}", written.format, written.contents);
    for symbol in &written.symbols {
        println!("  {} -> {}", symbol.symbol, symbol.component);
    }

    let solved = client
        .solve_model(Request::new(SolveRequest {
            model: Some(planning_model()),
            solver: String::new(),
        }))
        .await?
        .into_inner();

    println!("\n=== Solution ({}) ===", solved.solver_name);
    println!("Status: {}", solved.termination_condition);
    if let Some(objective) = solved.best_feasible_objective {
        println!("Profit: ${:.2}", objective);
    }
    for value in &solved.values {
        println!("  {:<8} {:.2}", value.name, value.value);
    }
    println!("Solve time: {:.2} ms", solved.wallclock_ms);

    Ok(())
}
