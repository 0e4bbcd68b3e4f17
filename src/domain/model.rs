use super::expr::{Expr, Relation};
use super::value_objects::{ObjectiveSense, SuffixDirection, VariableDomain};
use crate::repn::{generate_standard_repn, visitor, RepnOptions};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_MODEL_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique model identity carried by every component id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(u32);

macro_rules! component_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            model: ModelId,
            index: u32,
        }

        impl $name {
            fn new(model: ModelId, index: usize) -> Self {
                Self {
                    model,
                    index: index as u32,
                }
            }

            /// Position in declaration order
            pub fn index(&self) -> usize {
                self.index as usize
            }

            pub fn model(&self) -> ModelId {
                self.model
            }
        }
    };
}

component_id!(
    /// Handle to a decision variable
    VarId
);
component_id!(
    /// Handle to a parameter
    ParamId
);
component_id!(ConstraintId);
component_id!(ObjectiveId);
component_id!(BlockId);
component_id!(SuffixId);

/// Any component a writer can put a name on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentRef {
    Var(VarId),
    Constraint(ConstraintId),
    Objective(ObjectiveId),
}

impl From<VarId> for ComponentRef {
    fn from(id: VarId) -> Self {
        ComponentRef::Var(id)
    }
}

impl From<ConstraintId> for ComponentRef {
    fn from(id: ConstraintId) -> Self {
        ComponentRef::Constraint(id)
    }
}

impl From<ObjectiveId> for ComponentRef {
    fn from(id: ObjectiveId) -> Self {
        ComponentRef::Objective(id)
    }
}

/// Errors raised while building or evaluating a model
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Component name '{0}' is already in use")]
    DuplicateName(String),

    #[error("{0} does not belong to this model")]
    ForeignComponent(String),

    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    #[error("No value for uninitialized parameter '{0}'")]
    UninitializedParam(String),

    #[error("No value for uninitialized variable '{0}'")]
    UninitializedVar(String),

    #[error("Parameter '{0}' is immutable and already has a value")]
    ImmutableParam(String),

    #[error("Bound of '{0}' depends on a variable that is not fixed")]
    NonFixedBound(String),

    #[error("Constraint '{0}' has no variables and is infeasible")]
    InfeasibleConstraint(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// Decision variable in an optimization model
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub domain: VariableDomain,
    pub lower: Option<Expr>,
    pub upper: Option<Expr>,
    pub value: Option<f64>,
    pub fixed: bool,
    pub block: Option<BlockId>,
}

impl Variable {
    /// Unbounded continuous variable
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: VariableDomain::Reals,
            lower: None,
            upper: None,
            value: None,
            fixed: false,
            block: None,
        }
    }

    pub fn non_negative(name: impl Into<String>) -> Self {
        Self::new(name).with_domain(VariableDomain::NonNegativeReals)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name).with_domain(VariableDomain::Integers)
    }

    pub fn binary(name: impl Into<String>) -> Self {
        Self::new(name).with_domain(VariableDomain::Binary)
    }

    pub fn with_domain(mut self, domain: VariableDomain) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_bounds(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        self.lower = lower.map(Expr::constant);
        self.upper = upper.map(Expr::constant);
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn fixed_at(mut self, value: f64) -> Self {
        self.value = Some(value);
        self.fixed = true;
        self
    }

    pub fn is_integer(&self) -> bool {
        self.domain.is_integer()
    }
}

/// Named numeric placeholder
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub value: Option<f64>,
    pub mutable: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            mutable: false,
        }
    }

    pub fn mutable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            mutable: true,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }
}

/// Algebraic constraint `lower <= body <= upper`
#[derive(Debug, Clone)]
pub struct Constraint {
    pub name: String,
    pub relation: Relation,
    pub active: bool,
    pub block: BlockId,
}

/// Objective to minimize or maximize
#[derive(Debug, Clone)]
pub struct Objective {
    pub name: String,
    pub expr: Expr,
    pub sense: ObjectiveSense,
    pub active: bool,
    pub block: BlockId,
}

/// Named container for components; deactivating it deactivates its contents
#[derive(Debug, Clone)]
pub struct Block {
    pub name: String,
    pub parent: Option<BlockId>,
    pub active: bool,
}

/// Directed side-channel data keyed by component
#[derive(Debug, Clone)]
pub struct Suffix {
    pub name: String,
    pub direction: SuffixDirection,
    pub active: bool,
    pub values: BTreeMap<ComponentRef, f64>,
}

/// Container for every component of an optimization model
#[derive(Debug, Clone)]
pub struct Model {
    id: ModelId,
    name: String,
    names: HashSet<String>,
    blocks: Vec<Block>,
    vars: Vec<Variable>,
    params: Vec<Param>,
    constraints: Vec<Option<Constraint>>,
    objectives: Vec<Option<Objective>>,
    suffixes: Vec<Suffix>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ModelId(NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            names: HashSet::new(),
            blocks: vec![Block {
                name: String::new(),
                parent: None,
                active: true,
            }],
            vars: Vec::new(),
            params: Vec::new(),
            constraints: Vec::new(),
            objectives: Vec::new(),
            suffixes: Vec::new(),
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root_block(&self) -> BlockId {
        BlockId::new(self.id, 0)
    }

    // ---- names -----------------------------------------------------------

    fn qualified_name(&self, block: BlockId, local: &str) -> String {
        let prefix = &self.blocks[block.index()].name;
        if prefix.is_empty() {
            local.to_string()
        } else {
            format!("{}.{}", prefix, local)
        }
    }

    fn claim_name(&mut self, block: BlockId, local: &str) -> Result<String> {
        let full = self.qualified_name(block, local);
        if !self.names.insert(full.clone()) {
            return Err(ModelError::DuplicateName(full));
        }
        Ok(full)
    }

    fn check_owner(&self, owner: ModelId, what: impl fmt::Display) -> Result<()> {
        if owner != self.id {
            return Err(ModelError::ForeignComponent(what.to_string()));
        }
        Ok(())
    }

    /// Fully qualified name of a component
    pub fn component_name(&self, component: ComponentRef) -> Result<&str> {
        match component {
            ComponentRef::Var(id) => Ok(self.var(id)?.name.as_str()),
            ComponentRef::Constraint(id) => Ok(self.constraint(id)?.name.as_str()),
            ComponentRef::Objective(id) => Ok(self.objective(id)?.name.as_str()),
        }
    }

    // ---- blocks ----------------------------------------------------------

    pub fn add_block(&mut self, name: impl AsRef<str>) -> Result<BlockId> {
        self.add_sub_block(self.root_block(), name)
    }

    pub fn add_sub_block(&mut self, parent: BlockId, name: impl AsRef<str>) -> Result<BlockId> {
        self.check_block(parent)?;
        let full = self.claim_name(parent, name.as_ref())?;
        self.blocks.push(Block {
            name: full,
            parent: Some(parent),
            active: true,
        });
        Ok(BlockId::new(self.id, self.blocks.len() - 1))
    }

    fn check_block(&self, id: BlockId) -> Result<&Block> {
        self.check_owner(id.model, format_args!("Block #{}", id.index))?;
        self.blocks
            .get(id.index())
            .ok_or_else(|| ModelError::UnknownComponent(format!("block #{}", id.index)))
    }

    pub fn block(&self, id: BlockId) -> Result<&Block> {
        self.check_block(id)
    }

    pub fn deactivate_block(&mut self, id: BlockId) -> Result<()> {
        self.check_block(id)?;
        self.blocks[id.index()].active = false;
        Ok(())
    }

    pub fn activate_block(&mut self, id: BlockId) -> Result<()> {
        self.check_block(id)?;
        self.blocks[id.index()].active = true;
        Ok(())
    }

    /// Active when the block and all of its ancestors are active
    pub fn is_block_active(&self, id: BlockId) -> bool {
        let mut current = Some(id);
        while let Some(block_id) = current {
            match self.blocks.get(block_id.index()) {
                Some(block) if block.active => current = block.parent,
                _ => return false,
            }
        }
        true
    }

    // ---- variables -------------------------------------------------------

    pub fn add_var(&mut self, var: Variable) -> Result<VarId> {
        let block = var.block.unwrap_or_else(|| self.root_block());
        self.add_var_in(block, var)
    }

    pub fn add_var_in(&mut self, block: BlockId, mut var: Variable) -> Result<VarId> {
        self.check_block(block)?;
        for bound in var.lower.iter().chain(var.upper.iter()) {
            if bound.contains_vars() {
                return Err(ModelError::NonFixedBound(var.name.clone()));
            }
        }
        var.name = self.claim_name(block, &var.name)?;
        var.block = Some(block);
        self.vars.push(var);
        Ok(VarId::new(self.id, self.vars.len() - 1))
    }

    /// Add one variable per index, named `name[index]`
    pub fn add_indexed_var<I, T>(&mut self, name: &str, indices: I, template: Variable) -> Result<Vec<VarId>>
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        indices
            .into_iter()
            .map(|index| {
                let mut var = template.clone();
                var.name = format!("{}[{}]", name, index);
                self.add_var(var)
            })
            .collect()
    }

    pub fn var(&self, id: VarId) -> Result<&Variable> {
        self.check_owner(id.model, format_args!("Variable #{}", id.index))?;
        self.vars
            .get(id.index())
            .ok_or_else(|| ModelError::UnknownComponent(format!("variable #{}", id.index)))
    }

    fn var_mut(&mut self, id: VarId) -> Result<&mut Variable> {
        self.var(id)?;
        Ok(&mut self.vars[id.index()])
    }

    pub fn vars(&self) -> impl Iterator<Item = (VarId, &Variable)> {
        let model = self.id;
        self.vars
            .iter()
            .enumerate()
            .map(move |(i, var)| (VarId::new(model, i), var))
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn set_lb(&mut self, id: VarId, lower: impl Into<Expr>) -> Result<()> {
        let lower = lower.into();
        let var = self.var_mut(id)?;
        if lower.contains_vars() {
            return Err(ModelError::NonFixedBound(var.name.clone()));
        }
        var.lower = Some(lower);
        Ok(())
    }

    pub fn set_ub(&mut self, id: VarId, upper: impl Into<Expr>) -> Result<()> {
        let upper = upper.into();
        let var = self.var_mut(id)?;
        if upper.contains_vars() {
            return Err(ModelError::NonFixedBound(var.name.clone()));
        }
        var.upper = Some(upper);
        Ok(())
    }

    pub fn set_value(&mut self, id: VarId, value: f64) -> Result<()> {
        self.var_mut(id)?.value = Some(value);
        Ok(())
    }

    pub fn clear_value(&mut self, id: VarId) -> Result<()> {
        self.var_mut(id)?.value = None;
        Ok(())
    }

    pub fn fix(&mut self, id: VarId, value: f64) -> Result<()> {
        let var = self.var_mut(id)?;
        var.value = Some(value);
        var.fixed = true;
        Ok(())
    }

    pub fn unfix(&mut self, id: VarId) -> Result<()> {
        self.var_mut(id)?.fixed = false;
        Ok(())
    }

    /// Domain bounds intersected with declared bounds at current parameter
    /// values; infinite values are reported as `None`
    pub fn var_bounds(&self, id: VarId) -> Result<(Option<f64>, Option<f64>)> {
        let var = self.var(id)?;
        let (domain_lower, domain_upper) = var.domain.implied_bounds();
        let declared_lower = self.optional_bound(&var.name, var.lower.as_ref())?;
        let declared_upper = self.optional_bound(&var.name, var.upper.as_ref())?;

        let lower = match (domain_lower, declared_lower) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
        .filter(|v| *v != f64::NEG_INFINITY);
        let upper = match (domain_upper, declared_upper) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
        .filter(|v| *v != f64::INFINITY);
        Ok((lower, upper))
    }

    fn optional_bound(&self, owner: &str, bound: Option<&Expr>) -> Result<Option<f64>> {
        bound.map(|expr| self.fixed_value(owner, expr)).transpose()
    }

    // ---- parameters ------------------------------------------------------

    pub fn add_param(&mut self, mut param: Param) -> Result<ParamId> {
        param.name = self.claim_name(self.root_block(), &param.name)?;
        self.params.push(param);
        Ok(ParamId::new(self.id, self.params.len() - 1))
    }

    pub fn param(&self, id: ParamId) -> Result<&Param> {
        self.check_owner(id.model, format_args!("Parameter #{}", id.index))?;
        self.params
            .get(id.index())
            .ok_or_else(|| ModelError::UnknownComponent(format!("parameter #{}", id.index)))
    }

    pub fn set_param_value(&mut self, id: ParamId, value: f64) -> Result<()> {
        self.param(id)?;
        let param = &mut self.params[id.index()];
        if !param.mutable && param.value.is_some() {
            return Err(ModelError::ImmutableParam(param.name.clone()));
        }
        param.value = Some(value);
        Ok(())
    }

    // ---- constraints -----------------------------------------------------

    pub fn add_constraint(&mut self, name: impl AsRef<str>, relation: Relation) -> Result<ConstraintId> {
        self.add_constraint_in(self.root_block(), name, relation)
    }

    pub fn add_constraint_in(
        &mut self,
        block: BlockId,
        name: impl AsRef<str>,
        relation: Relation,
    ) -> Result<ConstraintId> {
        self.check_block(block)?;
        let local = name.as_ref();
        for bound in relation.lower.iter().chain(relation.upper.iter()) {
            if bound.contains_vars() {
                return Err(ModelError::NonFixedBound(self.qualified_name(block, local)));
            }
        }
        let name = self.claim_name(block, local)?;
        self.constraints.push(Some(Constraint {
            name,
            relation,
            active: true,
            block,
        }));
        Ok(ConstraintId::new(self.id, self.constraints.len() - 1))
    }

    /// Add one constraint per index, named `name[index]`
    pub fn add_indexed_constraint<I, T, F>(
        &mut self,
        name: &str,
        indices: I,
        mut rule: F,
    ) -> Result<Vec<ConstraintId>>
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
        F: FnMut(&T) -> Relation,
    {
        indices
            .into_iter()
            .map(|index| {
                let relation = rule(&index);
                self.add_constraint(format!("{}[{}]", name, index), relation)
            })
            .collect()
    }

    pub fn constraint(&self, id: ConstraintId) -> Result<&Constraint> {
        self.check_owner(id.model, format_args!("Constraint #{}", id.index))?;
        self.constraints
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| ModelError::UnknownComponent(format!("constraint #{}", id.index)))
    }

    pub fn deactivate_constraint(&mut self, id: ConstraintId) -> Result<()> {
        self.constraint(id)?;
        if let Some(con) = self.constraints[id.index()].as_mut() {
            con.active = false;
        }
        Ok(())
    }

    pub fn activate_constraint(&mut self, id: ConstraintId) -> Result<()> {
        self.constraint(id)?;
        if let Some(con) = self.constraints[id.index()].as_mut() {
            con.active = true;
        }
        Ok(())
    }

    /// Delete a constraint; ids of the remaining constraints stay valid
    pub fn remove_constraint(&mut self, id: ConstraintId) -> Result<Constraint> {
        self.constraint(id)?;
        let removed = self.constraints[id.index()]
            .take()
            .ok_or_else(|| ModelError::UnknownComponent(format!("constraint #{}", id.index)))?;
        self.names.remove(&removed.name);
        Ok(removed)
    }

    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        let model = self.id;
        self.constraints
            .iter()
            .enumerate()
            .filter_map(move |(i, slot)| slot.as_ref().map(|con| (ConstraintId::new(model, i), con)))
    }

    pub fn active_constraints(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.constraints()
            .filter(move |(_, con)| con.active && self.is_block_active(con.block))
    }

    // ---- objectives ------------------------------------------------------

    pub fn add_objective(
        &mut self,
        name: impl AsRef<str>,
        expr: impl Into<Expr>,
        sense: ObjectiveSense,
    ) -> Result<ObjectiveId> {
        self.add_objective_in(self.root_block(), name, expr, sense)
    }

    pub fn add_objective_in(
        &mut self,
        block: BlockId,
        name: impl AsRef<str>,
        expr: impl Into<Expr>,
        sense: ObjectiveSense,
    ) -> Result<ObjectiveId> {
        self.check_block(block)?;
        let name = self.claim_name(block, name.as_ref())?;
        self.objectives.push(Some(Objective {
            name,
            expr: expr.into(),
            sense,
            active: true,
            block,
        }));
        Ok(ObjectiveId::new(self.id, self.objectives.len() - 1))
    }

    pub fn objective(&self, id: ObjectiveId) -> Result<&Objective> {
        self.check_owner(id.model, format_args!("Objective #{}", id.index))?;
        self.objectives
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| ModelError::UnknownComponent(format!("objective #{}", id.index)))
    }

    pub fn deactivate_objective(&mut self, id: ObjectiveId) -> Result<()> {
        self.objective(id)?;
        if let Some(obj) = self.objectives[id.index()].as_mut() {
            obj.active = false;
        }
        Ok(())
    }

    pub fn remove_objective(&mut self, id: ObjectiveId) -> Result<Objective> {
        self.objective(id)?;
        let removed = self.objectives[id.index()]
            .take()
            .ok_or_else(|| ModelError::UnknownComponent(format!("objective #{}", id.index)))?;
        self.names.remove(&removed.name);
        Ok(removed)
    }

    pub fn objectives(&self) -> impl Iterator<Item = (ObjectiveId, &Objective)> {
        let model = self.id;
        self.objectives
            .iter()
            .enumerate()
            .filter_map(move |(i, slot)| slot.as_ref().map(|obj| (ObjectiveId::new(model, i), obj)))
    }

    pub fn active_objectives(&self) -> impl Iterator<Item = (ObjectiveId, &Objective)> {
        self.objectives()
            .filter(move |(_, obj)| obj.active && self.is_block_active(obj.block))
    }

    // ---- suffixes --------------------------------------------------------

    pub fn add_suffix(&mut self, name: impl AsRef<str>, direction: SuffixDirection) -> Result<SuffixId> {
        let name = self.claim_name(self.root_block(), name.as_ref())?;
        self.suffixes.push(Suffix {
            name,
            direction,
            active: true,
            values: BTreeMap::new(),
        });
        Ok(SuffixId::new(self.id, self.suffixes.len() - 1))
    }

    pub fn suffix(&self, id: SuffixId) -> Result<&Suffix> {
        self.check_owner(id.model, format_args!("Suffix #{}", id.index))?;
        self.suffixes
            .get(id.index())
            .ok_or_else(|| ModelError::UnknownComponent(format!("suffix #{}", id.index)))
    }

    pub fn set_suffix_value(
        &mut self,
        id: SuffixId,
        component: impl Into<ComponentRef>,
        value: f64,
    ) -> Result<()> {
        self.suffix(id)?;
        let component = component.into();
        self.component_name(component)?;
        self.suffixes[id.index()].values.insert(component, value);
        Ok(())
    }

    /// Give every component of a group the same suffix value; nothing is
    /// stored unless all of them belong to this model
    pub fn set_suffix_values<I>(&mut self, id: SuffixId, components: I, value: f64) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<ComponentRef>,
    {
        self.suffix(id)?;
        let components: Vec<ComponentRef> = components.into_iter().map(Into::into).collect();
        for component in &components {
            self.component_name(*component)?;
        }
        let values = &mut self.suffixes[id.index()].values;
        values.extend(components.into_iter().map(|component| (component, value)));
        Ok(())
    }

    pub fn deactivate_suffix(&mut self, id: SuffixId) -> Result<()> {
        self.suffix(id)?;
        self.suffixes[id.index()].active = false;
        Ok(())
    }

    pub fn suffixes(&self) -> impl Iterator<Item = &Suffix> {
        self.suffixes.iter()
    }

    pub fn active_export_suffixes(&self) -> impl Iterator<Item = &Suffix> {
        self.suffixes
            .iter()
            .filter(|suffix| suffix.active && suffix.direction.is_export())
    }

    // ---- evaluation ------------------------------------------------------

    /// Evaluate an expression at the current variable and parameter values
    pub fn value(&self, expr: &Expr) -> Result<f64> {
        visitor::evaluate(self, expr)
    }

    /// Evaluate an expression that must not depend on free variables
    pub fn fixed_value(&self, owner: &str, expr: &Expr) -> Result<f64> {
        if let Some(value) = expr.as_constant() {
            return Ok(value);
        }
        let repn = generate_standard_repn(self, expr, RepnOptions::default())?;
        if !repn.is_constant() {
            return Err(ModelError::NonFixedBound(owner.to_string()));
        }
        Ok(repn.constant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_qualified_by_block_and_unique() {
        let mut model = Model::new("m");
        let other = model.add_block("other").unwrap();
        let a = model.add_var_in(other, Variable::new("a")).unwrap();
        assert_eq!(model.var(a).unwrap().name, "other.a");
        assert_eq!(
            model.add_var(Variable::new("other")).unwrap_err(),
            ModelError::DuplicateName("other".to_string())
        );
    }

    #[test]
    fn ids_from_another_model_are_rejected() {
        let mut first = Model::new("first");
        let second = Model::new("second");
        let x = first.add_var(Variable::new("x")).unwrap();
        assert!(matches!(second.var(x), Err(ModelError::ForeignComponent(_))));
    }

    #[test]
    fn indexed_variables_get_bracketed_names() {
        let mut model = Model::new("m");
        let y = model.add_indexed_var("y", [1, 2], Variable::binary("")).unwrap();
        assert_eq!(model.var(y[1]).unwrap().name, "y[2]");
        assert!(model.var(y[0]).unwrap().is_integer());
    }

    #[test]
    fn bounds_combine_domain_and_mutable_params() {
        let mut model = Model::new("m");
        let p = model.add_param(Param::mutable("p")).unwrap();
        let y = model.add_var(Variable::non_negative("y")).unwrap();
        model.set_lb(y, -5.0 + 0.0 * Expr::from(p)).unwrap();
        model.set_ub(y, p).unwrap();
        assert!(matches!(
            model.var_bounds(y),
            Err(ModelError::UninitializedParam(_))
        ));

        model.set_param_value(p, 9.0).unwrap();
        assert_eq!(model.var_bounds(y).unwrap(), (Some(0.0), Some(9.0)));
        model.set_param_value(p, 3.0).unwrap();
        assert_eq!(model.var_bounds(y).unwrap(), (Some(0.0), Some(3.0)));
    }

    #[test]
    fn immutable_params_cannot_change() {
        let mut model = Model::new("m");
        let p = model.add_param(Param::new("p", 1.0)).unwrap();
        assert!(matches!(
            model.set_param_value(p, 2.0),
            Err(ModelError::ImmutableParam(_))
        ));
    }

    #[test]
    fn deactivated_blocks_hide_their_constraints() {
        let mut model = Model::new("m");
        let x = model.add_var(Variable::new("x")).unwrap();
        let inner = model.add_block("inner").unwrap();
        let nested = model.add_sub_block(inner, "nested").unwrap();
        model
            .add_constraint_in(nested, "c", Expr::from(x).leq(1.0))
            .unwrap();
        model.add_constraint("d", Expr::from(x).geq(0.0)).unwrap();
        assert_eq!(model.active_constraints().count(), 2);

        model.deactivate_block(inner).unwrap();
        let names: Vec<_> = model
            .active_constraints()
            .map(|(_, con)| con.name.clone())
            .collect();
        assert_eq!(names, vec!["d".to_string()]);
    }

    #[test]
    fn removed_constraints_free_their_name() {
        let mut model = Model::new("m");
        let x = model.add_var(Variable::new("x")).unwrap();
        let c1 = model.add_constraint("c1", Expr::from(x).leq(1.0)).unwrap();
        let c2 = model.add_constraint("c2", Expr::from(x).leq(2.0)).unwrap();
        model.remove_constraint(c1).unwrap();
        assert!(model.constraint(c1).is_err());
        assert_eq!(model.constraint(c2).unwrap().name, "c2");
        model.add_constraint("c1", Expr::from(x).leq(3.0)).unwrap();
    }

    #[test]
    fn constraint_bounds_must_be_fixed() {
        let mut model = Model::new("m");
        let x = model.add_var(Variable::new("x")).unwrap();
        let relation = Relation::ranged(x, x, 1.0);
        assert!(matches!(
            model.add_constraint("bad", relation),
            Err(ModelError::NonFixedBound(_))
        ));
    }

    #[test]
    fn suffix_values_require_known_components() {
        let mut model = Model::new("m");
        let x = model.add_var(Variable::binary("x")).unwrap();
        let priority = model.add_suffix("priority", SuffixDirection::Export).unwrap();
        model.set_suffix_value(priority, x, 1.0).unwrap();
        assert_eq!(model.active_export_suffixes().count(), 1);
        model.deactivate_suffix(priority).unwrap();
        assert_eq!(model.active_export_suffixes().count(), 0);
    }

    #[test]
    fn suffix_values_can_be_set_for_a_group() {
        let mut model = Model::new("m");
        let x = model.add_indexed_var("x", 0..3, Variable::binary("x")).unwrap();
        let cap = model.add_constraint("cap", (x[0] + x[1]).leq(1.0)).unwrap();
        let priority = model.add_suffix("priority", SuffixDirection::Export).unwrap();

        model.set_suffix_values(priority, x.iter().copied(), 2.0).unwrap();
        model.set_suffix_values(priority, [cap], 5.0).unwrap();
        let values = &model.suffix(priority).unwrap().values;
        assert_eq!(values.len(), 4);
        assert!(x.iter().all(|&id| values[&ComponentRef::Var(id)] == 2.0));
        assert_eq!(values[&ComponentRef::Constraint(cap)], 5.0);

        let mut other = Model::new("other");
        let stranger = other.add_var(Variable::new("s")).unwrap();
        let mixed = [ComponentRef::Var(x[0]), ComponentRef::Var(stranger)];
        assert!(model.set_suffix_values(priority, mixed, 9.0).is_err());
        assert_eq!(model.suffix(priority).unwrap().values[&ComponentRef::Var(x[0])], 2.0);
    }
}
