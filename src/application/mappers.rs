// Mappers: Convert between gRPC protobuf types and domain models
// This keeps protobuf dependencies isolated from business logic (Dependency Inversion)

use crate::domain::{
    expr::{Expr, Relation},
    model::{ComponentRef, ConstraintId, Model, ModelError, ObjectiveId, Param, ParamId, VarId, Variable},
    solver_service::SolveResults,
    value_objects::{ObjectiveSense, ProblemFormat, SuffixDirection, UnaryFunction, VariableDomain},
    writer_service::WrittenProblem,
};
use std::borrow::Borrow;
use std::collections::HashMap;
use tonic::Status;

pub mod letsmodel {
    tonic::include_proto!("letsmodel");
}

use letsmodel as proto;

pub type Result<T> = std::result::Result<T, Box<Status>>;

fn invalid(message: impl Into<String>) -> Box<Status> {
    Box::new(Status::invalid_argument(message))
}

fn model_error(error: ModelError) -> Box<Status> {
    invalid(error.to_string())
}

// Recursive message fields may or may not be boxed by the code generator
fn operand<E: Borrow<proto::Expression>>(
    field: &Option<E>,
    what: &str,
) -> Result<&proto::Expression> {
    field
        .as_ref()
        .map(Borrow::borrow)
        .ok_or_else(|| invalid(format!("{} is missing", what)))
}

/// Builds a domain model from protobuf components, resolving names as they
/// arrive; components may only reference names sent before them
pub struct ModelBuilder {
    model: Model,
    vars: HashMap<String, VarId>,
    params: HashMap<String, ParamId>,
    constraints: HashMap<String, ConstraintId>,
    objectives: HashMap<String, ObjectiveId>,
}

impl ModelBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            model: Model::new(name),
            vars: HashMap::new(),
            params: HashMap::new(),
            constraints: HashMap::new(),
            objectives: HashMap::new(),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn finish(self) -> Model {
        self.model
    }

    fn var(&self, name: &str) -> Result<VarId> {
        self.vars
            .get(name)
            .copied()
            .ok_or_else(|| invalid(format!("Unknown variable '{}'", name)))
    }

    fn param(&self, name: &str) -> Result<ParamId> {
        self.params
            .get(name)
            .copied()
            .ok_or_else(|| invalid(format!("Unknown parameter '{}'", name)))
    }

    fn component(&self, name: &str) -> Result<ComponentRef> {
        if let Some(id) = self.vars.get(name) {
            return Ok(ComponentRef::Var(*id));
        }
        if let Some(id) = self.constraints.get(name) {
            return Ok(ComponentRef::Constraint(*id));
        }
        self.objectives
            .get(name)
            .map(|id| ComponentRef::Objective(*id))
            .ok_or_else(|| invalid(format!("Unknown component '{}'", name)))
    }

    /// Convert a protobuf expression tree
    pub fn expression(&self, expr: &proto::Expression) -> Result<Expr> {
        use proto::expression::Node;

        let node = expr
            .node
            .as_ref()
            .ok_or_else(|| invalid("Expression without a node"))?;
        let converted = match node {
            Node::Constant(value) => Expr::constant(*value),
            Node::Variable(name) => Expr::from(self.var(name)?),
            Node::Parameter(name) => Expr::from(self.param(name)?),
            Node::Negation(negation) => {
                -self.expression(operand(&negation.argument, "negation argument")?)?
            }
            Node::Sum(list) => Expr::sum(
                list.terms
                    .iter()
                    .map(|term| self.expression(term))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Node::Product(op) => {
                let (left, right) = self.operands(&op.left, &op.right)?;
                left * right
            }
            Node::Division(op) => {
                let (left, right) = self.operands(&op.left, &op.right)?;
                left / right
            }
            Node::Power(op) => {
                let (left, right) = self.operands(&op.left, &op.right)?;
                left.pow(right)
            }
            Node::Unary(op) => {
                let func: UnaryFunction = op.function.parse().map_err(invalid)?;
                self.expression(operand(&op.argument, "function argument")?)?
                    .apply(func)
            }
        };
        Ok(converted)
    }

    fn operands<E: Borrow<proto::Expression>>(
        &self,
        left: &Option<E>,
        right: &Option<E>,
    ) -> Result<(Expr, Expr)> {
        Ok((
            self.expression(operand(left, "left operand")?)?,
            self.expression(operand(right, "right operand")?)?,
        ))
    }

    pub fn add_variable(&mut self, proto_var: &proto::Variable) -> Result<VarId> {
        let domain = match proto::variable::Domain::try_from(proto_var.domain) {
            Ok(proto::variable::Domain::Reals) => VariableDomain::Reals,
            Ok(proto::variable::Domain::NonNegativeReals) => VariableDomain::NonNegativeReals,
            Ok(proto::variable::Domain::NonPositiveReals) => VariableDomain::NonPositiveReals,
            Ok(proto::variable::Domain::Integers) => VariableDomain::Integers,
            Ok(proto::variable::Domain::NonNegativeIntegers) => VariableDomain::NonNegativeIntegers,
            Ok(proto::variable::Domain::Binary) => VariableDomain::Binary,
            Err(_) => return Err(invalid("Invalid variable domain")),
        };

        let mut var = Variable::new(proto_var.name.as_str())
            .with_domain(domain)
            .with_bounds(proto_var.lower_bound, proto_var.upper_bound);
        match (proto_var.fixed, proto_var.value) {
            (true, Some(value)) => var = var.fixed_at(value),
            (true, None) => {
                return Err(invalid(format!(
                    "Variable '{}' is fixed without a value",
                    proto_var.name
                )))
            }
            (false, Some(value)) => var = var.with_value(value),
            (false, None) => {}
        }

        let id = self.model.add_var(var).map_err(model_error)?;
        self.vars.insert(proto_var.name.clone(), id);
        Ok(id)
    }

    pub fn add_parameter(&mut self, proto_param: &proto::Parameter) -> Result<ParamId> {
        let param = if proto_param.mutable {
            Param::mutable(proto_param.name.as_str()).with_value(proto_param.value)
        } else {
            Param::new(proto_param.name.as_str(), proto_param.value)
        };
        let id = self.model.add_param(param).map_err(model_error)?;
        self.params.insert(proto_param.name.clone(), id);
        Ok(id)
    }

    pub fn add_constraint(&mut self, proto_constr: &proto::Constraint) -> Result<ConstraintId> {
        let body = proto_constr
            .body
            .as_ref()
            .ok_or_else(|| invalid(format!("Constraint '{}' has no body", proto_constr.name)))?;
        let lower = proto_constr
            .lower
            .as_ref()
            .map(|e| self.expression(e))
            .transpose()?;
        let upper = proto_constr
            .upper
            .as_ref()
            .map(|e| self.expression(e))
            .transpose()?;
        if lower.is_none() && upper.is_none() {
            return Err(invalid(format!(
                "Constraint '{}' has neither a lower nor an upper bound",
                proto_constr.name
            )));
        }
        let relation = Relation::new(lower, self.expression(body)?, upper);

        let id = self
            .model
            .add_constraint(&proto_constr.name, relation)
            .map_err(model_error)?;
        if proto_constr.deactivated {
            self.model.deactivate_constraint(id).map_err(model_error)?;
        }
        self.constraints.insert(proto_constr.name.clone(), id);
        Ok(id)
    }

    pub fn add_objective(&mut self, proto_obj: &proto::Objective) -> Result<ObjectiveId> {
        let sense = match proto::objective::Sense::try_from(proto_obj.sense) {
            Ok(proto::objective::Sense::Minimize) => ObjectiveSense::Minimize,
            Ok(proto::objective::Sense::Maximize) => ObjectiveSense::Maximize,
            Err(_) => return Err(invalid("Invalid objective sense")),
        };
        let expr = proto_obj
            .expression
            .as_ref()
            .ok_or_else(|| invalid(format!("Objective '{}' has no expression", proto_obj.name)))?;
        let expr = self.expression(expr)?;

        let id = self
            .model
            .add_objective(&proto_obj.name, expr, sense)
            .map_err(model_error)?;
        if proto_obj.deactivated {
            self.model.deactivate_objective(id).map_err(model_error)?;
        }
        self.objectives.insert(proto_obj.name.clone(), id);
        Ok(id)
    }

    pub fn add_suffix(&mut self, proto_suffix: &proto::Suffix) -> Result<()> {
        let direction: SuffixDirection = proto_suffix.direction.parse().map_err(invalid)?;
        let id = self
            .model
            .add_suffix(&proto_suffix.name, direction)
            .map_err(model_error)?;
        // sorted so that errors are reproducible
        let mut values: Vec<_> = proto_suffix.values.iter().collect();
        values.sort_by(|a, b| a.0.cmp(b.0));
        for (name, value) in values {
            let component = self.component(name)?;
            self.model
                .set_suffix_value(id, component, *value)
                .map_err(model_error)?;
        }
        Ok(())
    }
}

/// Convert a complete protobuf model to a domain model
pub fn proto_to_domain_model(proto_model: &proto::Model) -> Result<Model> {
    let mut builder = ModelBuilder::new(&proto_model.name);
    for var in &proto_model.variables {
        builder.add_variable(var)?;
    }
    for param in &proto_model.parameters {
        builder.add_parameter(param)?;
    }
    for constraint in &proto_model.constraints {
        builder.add_constraint(constraint)?;
    }
    for objective in &proto_model.objectives {
        builder.add_objective(objective)?;
    }
    for suffix in &proto_model.suffixes {
        builder.add_suffix(suffix)?;
    }
    Ok(builder.finish())
}

/// Parse a format name, falling back to `default` when empty
pub fn proto_to_format(format: &str, default: ProblemFormat) -> Result<ProblemFormat> {
    if format.trim().is_empty() {
        return Ok(default);
    }
    format.parse().map_err(invalid)
}

/// Convert a rendered file to the protobuf response
pub fn domain_to_proto_written(
    model: &Model,
    format: ProblemFormat,
    written: WrittenProblem,
) -> Result<proto::WriteResponse> {
    let symbols = written
        .symbol_map
        .iter()
        .chain(written.symbol_map.aliases())
        .map(|(symbol, component)| {
            Ok(proto::Symbol {
                symbol: symbol.to_string(),
                component: model.component_name(component).map_err(model_error)?.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(proto::WriteResponse {
        format: format.extension().to_string(),
        contents: written.contents,
        symbols,
        auxiliary_files: written
            .auxiliary_files
            .into_iter()
            .map(|(extension, contents)| proto::AuxiliaryFile {
                extension,
                contents,
            })
            .collect(),
    })
}

/// Convert domain solve results to the protobuf response
pub fn domain_to_proto_results(model: &Model, results: SolveResults) -> Result<proto::SolveResponse> {
    let values = results
        .values
        .iter()
        .map(|(id, value)| {
            Ok(proto::VariableValue {
                name: model.var(*id).map_err(model_error)?.name.clone(),
                value: *value,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(proto::SolveResponse {
        termination_condition: results.termination_condition.to_string(),
        best_feasible_objective: results.best_feasible_objective,
        best_objective_bound: results.best_objective_bound,
        solver_name: results.solver_name,
        wallclock_ms: results.wallclock_ms,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proto::expression::Node;

    fn var(name: &str) -> proto::Expression {
        proto::Expression {
            node: Some(Node::Variable(name.to_string())),
        }
    }

    fn constant(value: f64) -> proto::Expression {
        proto::Expression {
            node: Some(Node::Constant(value)),
        }
    }

    fn variable(name: &str) -> proto::Variable {
        proto::Variable {
            name: name.to_string(),
            domain: proto::variable::Domain::NonNegativeReals as i32,
            ..Default::default()
        }
    }

    #[test]
    fn expressions_resolve_names() {
        let mut builder = ModelBuilder::new("m");
        let x = builder.add_variable(&variable("x")).unwrap();
        let product = proto::Expression {
            node: Some(Node::Product(
                proto::BinaryOp {
                    left: Some(constant(2.0).into()),
                    right: Some(var("x").into()),
                }
                .into(),
            )),
        };
        let expr = builder.expression(&product).unwrap();
        assert_eq!(expr, 2.0 * x);

        let unknown = builder.expression(&var("y")).unwrap_err();
        assert_eq!(unknown.code(), tonic::Code::InvalidArgument);
    }

    #[test]
    fn complete_models_convert() {
        let proto_model = proto::Model {
            name: "m".to_string(),
            variables: vec![variable("x"), variable("y")],
            constraints: vec![proto::Constraint {
                name: "c".to_string(),
                body: Some(proto::Expression {
                    node: Some(Node::Sum(
                        proto::ExpressionList {
                            terms: vec![var("x"), var("y")],
                        }
                        .into(),
                    )),
                }),
                upper: Some(constant(4.0)),
                ..Default::default()
            }],
            objectives: vec![proto::Objective {
                name: "obj".to_string(),
                expression: Some(var("x")),
                sense: proto::objective::Sense::Maximize as i32,
                ..Default::default()
            }],
            suffixes: vec![proto::Suffix {
                name: "priority".to_string(),
                direction: "export".to_string(),
                values: [("x".to_string(), 2.0)].into_iter().collect(),
            }],
            ..Default::default()
        };
        let model = proto_to_domain_model(&proto_model).unwrap();
        assert_eq!(model.num_vars(), 2);
        assert_eq!(model.active_constraints().count(), 1);
        assert_eq!(model.active_objectives().count(), 1);
        assert_eq!(model.active_export_suffixes().count(), 1);
    }

    #[test]
    fn constraints_need_a_bound() {
        let mut builder = ModelBuilder::new("m");
        builder.add_variable(&variable("x")).unwrap();
        let err = builder
            .add_constraint(&proto::Constraint {
                name: "c".to_string(),
                body: Some(var("x")),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }
}
