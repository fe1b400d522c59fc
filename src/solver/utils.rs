//! Boundary rows of vertical operators
use crate::field::Bc;
use ndarray::Array2;

/// Overwrite wall rows with identity rows (zero value)
pub fn dirichlify(mat: &mut Array2<f64>) {
    let last = mat.nrows() - 1;
    for r in [0, last] {
        mat.row_mut(r).fill(0.);
        mat[[r, r]] = 1.;
    }
}

/// Overwrite wall rows with derivative rows (zero derivative)
pub fn neumannify(mat: &mut Array2<f64>, d1: &Array2<f64>) {
    let last = mat.nrows() - 1;
    for r in [0, last] {
        mat.row_mut(r).assign(&d1.row(r));
    }
}

/// Apply the wall rows that belong to `bc`
pub fn apply_bc_rows(mat: &mut Array2<f64>, d1: &Array2<f64>, bc: Bc) {
    match bc {
        Bc::Dirichlet => dirichlify(mat),
        Bc::Neumann => neumannify(mat, d1),
    }
}

/// Replace the first row by the identity row, fixing the value at the
/// top wall and removing the constant null space
pub fn pin_first_row(mat: &mut Array2<f64>) {
    mat.row_mut(0).fill(0.);
    mat[[0, 0]] = 1.;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_boundary_rows() {
        let d1 = array![[1., 2., 3.], [4., 5., 6.], [7., 8., 9.]];
        let mut mat = Array2::<f64>::ones((3, 3));
        neumannify(&mut mat, &d1);
        assert_eq!(mat, array![[1., 2., 3.], [1., 1., 1.], [7., 8., 9.]]);
        dirichlify(&mut mat);
        assert_eq!(mat, array![[1., 0., 0.], [1., 1., 1.], [0., 0., 1.]]);
        mat[[0, 1]] = 5.;
        pin_first_row(&mut mat);
        assert_eq!(mat.row(0), array![1., 0., 0.]);
    }
}
