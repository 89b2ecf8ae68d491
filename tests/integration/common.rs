//! Shared checks.

use approx::assert_abs_diff_eq;
use twoopt::data::DataInterface;
use twoopt::network::Dimensions;

/// `x_eq = y[l] - y[l-1] + z + g + sum_i x[j,i] - sum_i x[i,j]` for every
/// `(j, rho, l)`, over the given variable family (`""` for the plan, `"^"`
/// for simulated results).
pub fn assert_balanced(data: &dyn DataInterface, dims: Dimensions, suffix: &str) {
    let var = |name: &str| format!("{name}{suffix}");
    for j in 0..dims.nodes {
        for rho in 0..dims.environments {
            for l in 0..dims.intervals {
                let at = |name: &str| data.get(&var(name), &[("j", j), ("rho", rho), ("l", l)]).unwrap();
                let previous = if l > 0 {
                    data.get(&var("y"), &[("j", j), ("rho", rho), ("l", l - 1)]).unwrap()
                } else {
                    0.0
                };
                let mut outgoing = 0.0;
                let mut incoming = 0.0;
                for i in 0..dims.nodes {
                    outgoing += data.get(&var("x"), &[("j", j), ("i", i), ("rho", rho), ("l", l)]).unwrap();
                    incoming += data.get(&var("x"), &[("j", i), ("i", j), ("rho", rho), ("l", l)]).unwrap();
                }
                let disposed = at("y") - previous + at("z") + at("g") + outgoing - incoming;
                assert_abs_diff_eq!(at("x_eq"), disposed, epsilon = 1e-6);
            }
        }
    }
}
