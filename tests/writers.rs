use letsmodel::domain::expr::{exp, sqrt, Expr};
use letsmodel::domain::model::ComponentRef;
use letsmodel::{
    Model, ModelError, ObjectiveSense, ProblemFormat, Variable, WriterError, WriterFactory,
    WriterOptions,
};

fn mixed_model() -> Model {
    let mut model = Model::new("demo");
    let x = model.add_var(Variable::non_negative("x")).unwrap();
    let y = model.add_var(Variable::binary("y")).unwrap();
    model
        .add_objective("profit", 3.0 * x + 2.0 * y, ObjectiveSense::Maximize)
        .unwrap();
    model.add_constraint("cap", (x + y).leq(4.0)).unwrap();
    model.add_constraint("link", (x - y).equals(1.0)).unwrap();
    model
}

#[test]
fn lp_file_matches_expected_layout() {
    let model = mixed_model();
    let written = WriterFactory::create(ProblemFormat::Lp)
        .render(&model, &WriterOptions::default())
        .unwrap();

    let expected = "\\* Source model name=demo *\\

max 
o1:
+3 x1
+2 x2

s.t.

c_u_c1_:
+1 x1
+1 x2
<= 4

c_e_c2_:
+1 x1
-1 x2
= 1

bounds
   0 <= x1 <= +inf
   0 <= x2 <= 1
binary
  x2
end
";
    assert_eq!(written.contents, expected);
}

#[test]
fn symbol_maps_point_back_at_components() {
    let model = mixed_model();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("demo.lp");

    let symbols = model.write(&path, None, &WriterOptions::symbolic()).unwrap();
    assert!(path.exists());

    let (x, _) = model.vars().next().unwrap();
    assert_eq!(symbols.symbol(x), Some("x"));
    let cap = symbols.component("cap").unwrap();
    assert_eq!(model.component_name(cap).unwrap(), "cap");
    assert_eq!(symbols.component("c_u_cap_"), Some(cap));

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("c_e_link_:\n+1 x\n-1 y\n= 1\n"));
}

#[test]
fn unknown_extensions_need_an_explicit_format() {
    let model = mixed_model();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("demo.txt");

    let err = model.write(&path, None, &WriterOptions::default()).unwrap_err();
    assert!(matches!(err, WriterError::InvalidOptions(_)));
    assert!(!path.exists());

    model
        .write(&path, Some(ProblemFormat::Gams), &WriterOptions::default())
        .unwrap();
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with("$offlisting\n$offdigit\n\n"));
    assert!(contents.contains("maximizing GAMS_OBJECTIVE;"));
}

#[test]
fn nl_files_come_with_row_and_col_files() {
    let mut model = Model::new("curve");
    let x = model.add_var(Variable::new("x")).unwrap();
    let y = model.add_var(Variable::non_negative("y")).unwrap();
    model.add_objective("obj", y, ObjectiveSense::Minimize).unwrap();
    model.add_constraint("curve", (exp(x) + y).leq(4.0)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("curve.nl");
    let symbols = model.write(&path, None, &WriterOptions::symbolic()).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with("g3 1 1 0\t# problem curve\n"));

    let rows = std::fs::read_to_string(dir.path().join("curve.row")).unwrap();
    assert_eq!(rows, "curve\nobj\n");
    let cols = std::fs::read_to_string(dir.path().join("curve.col")).unwrap();
    assert_eq!(cols, "x\ny\n");

    assert!(matches!(symbols.component("v0"), Some(ComponentRef::Var(id)) if id == x));
    assert!(matches!(symbols.component("v1"), Some(ComponentRef::Var(id)) if id == y));
}

#[test]
fn nl_variable_order_covers_constraint_and_objective_sets() {
    let mut model = Model::new("split");
    let obj_only = model.add_var(Variable::new("o")).unwrap();
    let shared = model.add_var(Variable::new("s")).unwrap();
    let con_only = model.add_var(Variable::new("c")).unwrap();
    let linear = model.add_var(Variable::non_negative("l")).unwrap();
    model
        .add_objective("obj", exp(obj_only) + exp(shared) + linear, ObjectiveSense::Minimize)
        .unwrap();
    model
        .add_constraint("cap", (exp(con_only) * shared).leq(1.0))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("split.nl");
    model.write(&path, None, &WriterOptions::symbolic()).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains(" 2 3 1\t# nonlinear vars in constraints, objectives, both\n"));
    let cols = std::fs::read_to_string(dir.path().join("split.col")).unwrap();
    assert_eq!(cols, "s\nc\no\nl\n");
}

#[test]
fn deep_constraints_that_divide_by_zero_fail_cleanly() {
    let mut model = Model::new("deep");
    let x = model.add_var(Variable::new("x")).unwrap();
    let mut body = Expr::from(x);
    for _ in 0..200_000 {
        body = -(exp(body) - 1.0);
    }
    model
        .add_constraint("blowup", (body / Expr::constant(0.0)).leq(1.0))
        .unwrap();

    for format in [ProblemFormat::Nl, ProblemFormat::Gams] {
        let err = WriterFactory::create(format)
            .render(&model, &WriterOptions::default())
            .unwrap_err();
        match err {
            WriterError::Model(ModelError::Evaluation(msg)) => {
                assert!(msg.starts_with("division by zero in '"));
                assert!(msg.len() < 200);
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}

#[test]
fn every_format_accepts_a_linear_model() {
    let model = mixed_model();
    for format in ProblemFormat::ALL {
        let written = WriterFactory::create(format)
            .render(&model, &WriterOptions::default())
            .unwrap();
        assert!(!written.contents.is_empty(), "{} wrote nothing", format);
        assert!(written.symbol_map.len() >= 5, "{} is missing symbols", format);
    }
}

#[test]
fn nonlinear_bodies_only_fit_nonlinear_formats() {
    let mut model = Model::new("m");
    let x = model.add_var(Variable::non_negative("x")).unwrap();
    model.add_objective("obj", sqrt(x), ObjectiveSense::Maximize).unwrap();
    model.add_constraint("c", Expr::from(x).leq(9.0)).unwrap();

    let options = WriterOptions::default();
    assert!(WriterFactory::create(ProblemFormat::Lp)
        .render(&model, &options)
        .is_err());
    for format in [ProblemFormat::Gams, ProblemFormat::Baron, ProblemFormat::Nl] {
        assert!(
            WriterFactory::create(format).render(&model, &options).is_ok(),
            "{} rejected sqrt",
            format
        );
    }
}
