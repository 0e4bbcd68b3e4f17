#![cfg(any(feature = "highs", feature = "coin_cbc"))]

use letsmodel::domain::value_objects::TerminationCondition;
use letsmodel::solver::SolverFactory;
use letsmodel::{Expr, Model, ObjectiveSense, SolverService, Variable};

fn knapsack() -> Model {
    let mut model = Model::new("knapsack");
    let items = [(5.0, 10.0), (4.0, 40.0), (6.0, 30.0), (3.0, 50.0)];
    let mut weight = Vec::new();
    let mut value = Vec::new();
    for (i, (w, v)) in items.iter().enumerate() {
        let x = model.add_var(Variable::binary(format!("take_{}", i))).unwrap();
        weight.push(*w * x);
        value.push(*v * x);
    }
    model
        .add_objective("value", Expr::sum(value), ObjectiveSense::Maximize)
        .unwrap();
    model
        .add_constraint("weight", Expr::sum(weight).leq(10.0))
        .unwrap();
    model
}

#[test]
fn default_solver_loads_values_back_into_the_model() {
    let solver = SolverFactory::default_solver().unwrap();
    let mut model = knapsack();

    let results = solver.solve(&model).unwrap();
    assert_eq!(results.termination_condition, TerminationCondition::Optimal);
    assert!((results.best_feasible_objective.unwrap() - 90.0).abs() < 1e-6);

    results.load_solution(&mut model).unwrap();
    let taken: Vec<&str> = model
        .vars()
        .filter(|(_, var)| var.value.is_some_and(|v| v > 0.5))
        .map(|(_, var)| var.name.as_str())
        .collect();
    assert_eq!(taken, ["take_1", "take_3"]);
}
