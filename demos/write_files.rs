// Example: write one model in every supported file format
//
// A small blending problem with a nonlinear quality curve:
//   minimize   2*a + 3*b
//   subject to a + b == 10
//              exp(0.1*a) + b >= 6
//              0 <= a <= 8, b >= 0
//
// The LP writer rejects the nonlinear row, so only the formats that can
// carry it are written; the linear relaxation goes to the LP file.
//
// Run with: cargo run --example write_files [output-dir]

use letsmodel::domain::expr::exp;
use letsmodel::{Model, ObjectiveSense, ProblemFormat, Variable, WriterOptions};
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);

    let mut model = Model::new("blend");
    let a = model.add_var(Variable::non_negative("a").with_bounds(Some(0.0), Some(8.0)))?;
    let b = model.add_var(Variable::non_negative("b"))?;

    model.add_objective("cost", 2.0 * a + 3.0 * b, ObjectiveSense::Minimize)?;
    model.add_constraint("total", (a + b).equals(10.0))?;
    let quality = model.add_constraint("quality", (exp(0.1 * a) + b).geq(6.0))?;

    let options = WriterOptions::symbolic();
    for format in [ProblemFormat::Gams, ProblemFormat::Baron, ProblemFormat::Nl] {
        let path = dir.join(format!("blend.{}", format.extension()));
        let symbols = model.write(&path, Some(format), &options)?;
        println!("{} -> {} ({} symbols)", format, path.display(), symbols.len());
    }

    model.deactivate_constraint(quality)?;
    let path = dir.join("blend_relaxed.lp");
    let symbols = model.write(&path, None, &options)?;
    println!("{} -> {}", ProblemFormat::Lp, path.display());
    for (symbol, component) in symbols.iter() {
        println!("  {:<8} {}", symbol, model.component_name(component)?);
    }

    Ok(())
}
