//! Tests for the loss computations and the majorization optimizer
//!
//! The numeric fixtures reproduce known-good values for the loss function,
//! the Huber hinge, the majorization coefficients, a single update step in
//! both storage schemes, and a fully converged training run.

use approx::assert_abs_diff_eq;
use gensvm::data::Dataset;
use gensvm::loss::{calculate_errors, calculate_huber, get_loss, huber};
use gensvm::matrix::{dense_to_csc, dense_to_csr, DesignMatrix};
use gensvm::model::{SvmModel, WeightPolicy};
use gensvm::optimize::{step_doubling, Workspace};
use gensvm::simplex::{simplex, simplex_diff};
use gensvm::update::{
    calculate_omega, majorize_is_simple, non_simple_coefficients, simple_coefficients, update,
};
use nalgebra::DMatrix;

/// Model with allocated state, simplex matrices, and instance weights
fn prepared_model(
    n: usize,
    m: usize,
    k: usize,
    p: f64,
    kappa: f64,
    lambda: f64,
    weights: WeightPolicy,
    y: &[usize],
) -> SvmModel {
    let mut model = SvmModel::new();
    model.p = p;
    model.kappa = kappa;
    model.lambda = lambda;
    model.weights = weights;
    model.n = n;
    model.m = m;
    model.k = k;
    model.allocate();
    model.initialize_weights(y);
    model.u = simplex(k);
    model.uu = simplex_diff(&model.u);
    model
}

fn dense_dataset(z: DMatrix<f64>, y: &[usize], k: usize) -> Dataset {
    let n = z.nrows();
    let m = z.ncols() - 1;
    Dataset {
        n,
        m,
        r: m,
        k,
        y: Some(y.to_vec()),
        z: DesignMatrix::Dense(z),
        kernel_basis: None,
    }
}

/// Eight-instance, three-class fixture used by the loss tests
fn loss_fixture_z() -> DMatrix<f64> {
    DMatrix::from_row_slice(
        8,
        4,
        &[
            1.0, 0.6112542725178001, -0.7672096202890778, -0.2600867145849611,
            1.0, 0.5881180210361963, -0.5419496202623567, 0.7079932865564023,
            1.0, -0.9411484777876639, -0.0251648291772256, 0.5335722872738475,
            1.0, -0.6506872332924795, -0.6277901989029552, -0.1196037902922388,
            1.0, -0.9955402476800429, -0.9514564047869466, -0.1093968234456487,
            1.0, 0.3277661334163890, 0.8271472175263959, 0.6938788574898458,
            1.0, -0.8459013990907077, -0.2453035880572786, 0.0078257345629504,
            1.0, -0.4629532094536982, 0.2935215202707828, 0.0540516162042732,
        ],
    )
}

fn loss_fixture_v() -> DMatrix<f64> {
    DMatrix::from_row_slice(
        4,
        2,
        &[
            0.6019309459245683, 0.0063825200426701,
            -0.9130102529085783, -0.8230766493212237,
            0.5727079522160434, 0.6466468145039965,
            -0.8065680884346328, 0.5912336906588613,
        ],
    )
}

const LOSS_FIXTURE_Y: [usize; 8] = [2, 1, 3, 2, 3, 3, 1, 2];

#[test]
fn test_loss_with_unit_weights() {
    let y = LOSS_FIXTURE_Y;
    let mut model = prepared_model(8, 3, 3, 1.5, 0.5, 0.123, WeightPolicy::Unit, &y);
    model.v = loss_fixture_v();
    let data = dense_dataset(loss_fixture_z(), &y, 3);

    let mut zv = DMatrix::zeros(8, 2);
    let loss = get_loss(&mut model, &data, &y, &mut zv);
    assert_abs_diff_eq!(loss, 0.903071383013108, epsilon = 1e-12);
}

#[test]
fn test_loss_with_group_weights() {
    let y = LOSS_FIXTURE_Y;
    let mut model = prepared_model(8, 3, 3, 1.5, 0.5, 0.123, WeightPolicy::Group, &y);
    model.v = loss_fixture_v();
    let data = dense_dataset(loss_fixture_z(), &y, 3);

    let mut zv = DMatrix::zeros(8, 2);
    let loss = get_loss(&mut model, &data, &y, &mut zv);
    assert_abs_diff_eq!(loss, 0.972847045993281, epsilon = 1e-12);
}

#[test]
fn test_huber_hinge() {
    // linear branch below -kappa
    assert_abs_diff_eq!(huber(-1.5, 0.5), 1.75, epsilon = 1e-14);
    assert_abs_diff_eq!(
        huber(-1.9705914880746673, 0.5),
        2.2205914880746673,
        epsilon = 1e-13
    );

    // quadratic branch on (-kappa, 1]
    assert_abs_diff_eq!(huber(0.75, 0.5), 0.0625 / 3.0, epsilon = 1e-14);
    assert_abs_diff_eq!(
        huber(0.9734009993634181, 0.5),
        0.0002358356116216,
        epsilon = 1e-13
    );
    assert_abs_diff_eq!(
        huber(-0.3386242674244120, 0.5),
        0.5973049764458478,
        epsilon = 1e-13
    );

    // zero above 1
    assert_abs_diff_eq!(huber(2.0, 0.5), 0.0, epsilon = 1e-15);
    assert_abs_diff_eq!(huber(1.0828252163937386, 0.5), 0.0, epsilon = 1e-15);
}

#[test]
fn test_calculate_omega() {
    let y = [2usize, 1, 3, 2, 3];
    let mut model = prepared_model(5, 3, 3, 1.213, 0.0, 0.1, WeightPolicy::Unit, &y);
    #[rustfmt::skip]
    let h = [
        0.8465725800087526, 1.2876921677680249, 1.0338561593991831,
        1.1891038526621391, 0.4034192031226095, 1.5298894170910078,
        1.3505111116922732, 1.4336863304586636, 1.7847533480330757,
        1.7712504341475415, 1.6905146737773038, 0.8189336598535132,
        0.6164203008844277, 0.2456444285093894, 0.8184193969741095,
    ];
    model.h = DMatrix::from_row_slice(5, 3, &h);

    let expected = [
        0.7394076262220608,
        0.7294526264247443,
        0.6802499471888741,
        0.6886792032441273,
        0.8695329737474283,
    ];
    for (i, &omega) in expected.iter().enumerate() {
        assert_abs_diff_eq!(calculate_omega(&model, &y, i), omega, epsilon = 1e-14);
    }
}

#[test]
fn test_majorize_is_simple() {
    let y = [2usize, 1, 3, 2, 3];
    let mut model = prepared_model(5, 3, 3, 1.213, 0.0, 0.1, WeightPolicy::Unit, &y);
    #[rustfmt::skip]
    let h = [
        0.8465725800087526, 1.2876921677680249, 1.0338561593991831,
        1.1891038526621391, 0.4034192031226095, 0.0,
        0.5, 0.0, 1.1,
        0.0, 0.0, 0.8189336598535132,
        0.6164203008844277, 0.2456444285093894, 0.8184193969741095,
    ];
    model.h = DMatrix::from_row_slice(5, 3, &h);

    let expected = [false, true, true, true, false];
    for (i, &simple) in expected.iter().enumerate() {
        assert_eq!(majorize_is_simple(&model, &y, i), simple, "instance {}", i);
    }
}

#[test]
fn test_simple_coefficients() {
    let kappa = 0.5;

    let (a, b_aq) = simple_coefficients(-1.5, kappa);
    assert_abs_diff_eq!(a, 0.142857142857143, epsilon = 1e-14);
    assert_abs_diff_eq!(b_aq, 0.5, epsilon = 1e-14);

    let (a, b_aq) = simple_coefficients(0.75, kappa);
    assert_abs_diff_eq!(a, 0.333333333333333, epsilon = 1e-14);
    assert_abs_diff_eq!(b_aq, 0.0833333333333333, epsilon = 1e-14);

    let (a, b_aq) = simple_coefficients(2.0, kappa);
    assert_abs_diff_eq!(a, 0.142857142857143, epsilon = 1e-14);
    assert_abs_diff_eq!(b_aq, 0.0, epsilon = 1e-14);
}

#[test]
fn test_non_simple_coefficients_huber_form() {
    // p = 2 selects the closed-form Huber majorizer
    let (p, kappa) = (2.0, 0.5);

    let (a, b_aq) = non_simple_coefficients(-1.0, p, kappa);
    assert_abs_diff_eq!(a, 1.5, epsilon = 1e-14);
    assert_abs_diff_eq!(b_aq, 1.25, epsilon = 1e-14);

    let (a, b_aq) = non_simple_coefficients(0.5, p, kappa);
    assert_abs_diff_eq!(a, 1.5, epsilon = 1e-14);
    assert_abs_diff_eq!(b_aq, 0.0277777777777778, epsilon = 1e-14);

    let (a, b_aq) = non_simple_coefficients(2.0, p, kappa);
    assert_abs_diff_eq!(a, 1.5, epsilon = 1e-14);
    assert_abs_diff_eq!(b_aq, 0.0, epsilon = 1e-14);
}

#[test]
fn test_non_simple_coefficients_general_form() {
    // with p = 1.5 and kappa = 0.5 the extra case boundary sits at -2
    let (p, kappa) = (1.5, 0.5);

    let (a, b_aq) = non_simple_coefficients(-3.0, p, kappa);
    assert_abs_diff_eq!(a, 0.312018860376691, epsilon = 1e-14);
    assert_abs_diff_eq!(b_aq, 1.35208172829900, epsilon = 1e-14);

    let (a, b_aq) = non_simple_coefficients(-1.0, p, kappa);
    assert_abs_diff_eq!(a, 0.866025403784439, epsilon = 1e-14);
    assert_abs_diff_eq!(b_aq, 0.838525491562421, epsilon = 1e-14);

    let (a, b_aq) = non_simple_coefficients(0.5, p, kappa);
    assert_abs_diff_eq!(a, 0.866025403784439, epsilon = 1e-14);
    assert_abs_diff_eq!(b_aq, 0.0721687836487032, epsilon = 1e-14);

    let (a, b_aq) = non_simple_coefficients(2.0, p, kappa);
    assert_abs_diff_eq!(a, 0.245495126515491, epsilon = 1e-14);
    assert_abs_diff_eq!(b_aq, 0.0, epsilon = 1e-14);
}

/// Eight-instance fixture for the one-step update tests
fn update_fixture_z() -> DMatrix<f64> {
    DMatrix::from_row_slice(
        8,
        4,
        &[
            1.0, 0.6437306339619082, -0.3276778319121999, 0.1564053473463392,
            1.0, -0.8683091763200105, -0.6910830836015162, -0.9675430665130734,
            1.0, -0.5024888699077029, -0.9649738292750712, 0.0776560791351473,
            1.0, 0.8206429991392579, -0.7255681388968501, -0.9475952272877165,
            1.0, 0.3426050950418613, -0.5340602451864306, -0.7159704241662815,
            1.0, -0.3077314049206620, 0.1141288036288195, -0.7060114827535847,
            1.0, 0.6301294373610109, -0.9983027363627769, -0.9365684178444004,
            1.0, -0.0665379368401439, -0.1781385556871763, -0.7292593770500276,
        ],
    )
}

fn update_fixture_v() -> DMatrix<f64> {
    DMatrix::from_row_slice(
        4,
        2,
        &[
            -0.7593642121025029, -0.5497320698504756,
            0.2982680646268177, -0.2491408622891925,
            -0.3118572761092807, 0.5461219445756100,
            -0.3198994238626641, 0.7134997072555367,
        ],
    )
}

fn update_expected_v() -> DMatrix<f64> {
    DMatrix::from_row_slice(
        4,
        2,
        &[
            -0.1323791019594062, -0.3598407983154332,
            0.3532993103400935, -0.4094572388475382,
            0.1313169839871234, 0.2423439972728328,
            0.0458431025455224, 0.4390030236354089,
        ],
    )
}

fn run_update_step(data: &Dataset, y: &[usize]) -> SvmModel {
    let mut model = prepared_model(8, 3, 3, 1.1, 0.5, 0.123, WeightPolicy::Unit, y);
    model.v = update_fixture_v();

    let mut work = Workspace::new(8, 3, 3);
    calculate_errors(&mut model, data, y, &mut work.zv);
    calculate_huber(&mut model);
    update(&mut model, data, y, &mut work).expect("fixture system is positive definite");
    model
}

#[test]
fn test_update_dense() {
    let y = LOSS_FIXTURE_Y;
    let data = dense_dataset(update_fixture_z(), &y, 3);
    let model = run_update_step(&data, &y);

    let expected = update_expected_v();
    for i in 0..4 {
        for j in 0..2 {
            assert_abs_diff_eq!(model.v[(i, j)], expected[(i, j)], epsilon = 1e-12);
        }
    }

    // the previous iterate moved into vbar
    let seed = update_fixture_v();
    for i in 0..4 {
        for j in 0..2 {
            assert_abs_diff_eq!(model.vbar[(i, j)], seed[(i, j)], epsilon = 1e-15);
        }
    }
}

#[test]
fn test_update_sparse_matches_dense() {
    let y = LOSS_FIXTURE_Y;
    let z = update_fixture_z();
    let data = Dataset {
        n: 8,
        m: 3,
        r: 3,
        k: 3,
        y: Some(y.to_vec()),
        z: DesignMatrix::Sparse(dense_to_csr(&z)),
        kernel_basis: None,
    };
    let model = run_update_step(&data, &y);

    let expected = update_expected_v();
    for i in 0..4 {
        for j in 0..2 {
            assert_abs_diff_eq!(model.v[(i, j)], expected[(i, j)], epsilon = 1e-12);
        }
    }
}

#[test]
fn test_update_csc_matches_dense() {
    let y = LOSS_FIXTURE_Y;
    let z = update_fixture_z();
    let data = Dataset {
        n: 8,
        m: 3,
        r: 3,
        k: 3,
        y: Some(y.to_vec()),
        z: DesignMatrix::SparseCsc(dense_to_csc(&z)),
        kernel_basis: None,
    };
    let model = run_update_step(&data, &y);

    let expected = update_expected_v();
    for i in 0..4 {
        for j in 0..2 {
            assert_abs_diff_eq!(model.v[(i, j)], expected[(i, j)], epsilon = 1e-12);
        }
    }
}

#[test]
fn test_step_doubling() {
    let y = [1usize, 2];
    let mut model = prepared_model(2, 1, 2, 1.0, 0.0, 0.1, WeightPolicy::Unit, &y);
    model.v = DMatrix::from_row_slice(2, 1, &[3.0, -1.5]);
    model.vbar = DMatrix::from_row_slice(2, 1, &[1.0, 0.5]);

    step_doubling(&mut model);

    assert_abs_diff_eq!(model.v[(0, 0)], 5.0, epsilon = 1e-15);
    assert_abs_diff_eq!(model.v[(1, 0)], -3.5, epsilon = 1e-15);
}

#[test]
fn test_train_seeded_linear() {
    let z = DMatrix::from_row_slice(
        10,
        4,
        &[
            1.0, 0.8056271362589000, 0.4874175854113872, 0.4453015882771756,
            1.0, 0.7940590105180981, 0.1861049005485224, 0.8469394287449229,
            1.0, 0.0294257611061681, 0.0242717976065267, 0.5039128672814752,
            1.0, 0.1746563833537603, 0.9135736087631979, 0.5270258081021366,
            1.0, 0.0022298761599785, 0.3773482059713607, 0.8009654729622842,
            1.0, 0.6638830667081945, 0.6467607601353914, 0.0434948735457108,
            1.0, 0.0770493004546461, 0.3699566427075194, 0.7863539761080217,
            1.0, 0.2685233952731509, 0.8539966432782011, 0.0967159557826836,
            1.0, 0.1163951898554611, 0.7667861436369238, 0.5031912600213351,
            1.0, 0.2290251898688216, 0.4401981048538806, 0.0884616753393881,
        ],
    );
    let y = vec![2usize, 1, 3, 2, 3, 2, 4, 1, 3, 4];

    let seed = DMatrix::from_row_slice(
        4,
        3,
        &[
            0.8233234072519983, 0.7701104553132680, 0.1102697774064020,
            0.7956168453294307, 0.3267543833513200, 0.8659836346403005,
            0.5777227081256917, 0.3693175185473680, 0.2728942849022845,
            0.4426030703804438, 0.2456426390463990, 0.2665038412777220,
        ],
    );

    let mut data = dense_dataset(z, &y, 4);
    let mut model = SvmModel::new();
    model.p = 1.2143;
    model.kappa = 0.90298;
    model.lambda = 0.00219038;
    model.epsilon = 1e-15;

    model.train(&mut data, Some(&seed)).expect("training converges");

    let expected = DMatrix::from_row_slice(
        4,
        3,
        &[
            -1.1907736868272805, 1.8651287814979396, 1.7250030581662932,
            0.7925100058806183, -3.6093428916761665, -1.3394018960329377,
            1.5203132433193016, -1.9118604362643852, -1.7939246097629342,
            0.0658817457370326, 0.6547924025329720, -0.6773346708737853,
        ],
    );
    for i in 0..4 {
        for j in 0..3 {
            assert_abs_diff_eq!(model.v[(i, j)], expected[(i, j)], epsilon = 1e-6);
        }
    }

    let info = model.info.as_ref().expect("training records a summary");
    assert!(info.converged);
    assert!(!info.loss_increased);
}

#[test]
fn test_training_decreases_loss() {
    let y = LOSS_FIXTURE_Y;
    let mut data = dense_dataset(loss_fixture_z(), &y, 3);

    // loss at the seed
    let mut seed_model = prepared_model(8, 3, 3, 1.5, 0.5, 0.01, WeightPolicy::Unit, &y);
    seed_model.v = loss_fixture_v();
    let mut zv = DMatrix::zeros(8, 2);
    let initial_loss = get_loss(&mut seed_model, &data, &y, &mut zv);

    let mut model = SvmModel::new();
    model.p = 1.5;
    model.kappa = 0.5;
    model.lambda = 0.01;
    model.epsilon = 1e-9;

    let seed = loss_fixture_v();
    model.train(&mut data, Some(&seed)).expect("training converges");

    let info = model.info.as_ref().expect("training records a summary");
    assert!(info.converged);
    assert!(info.loss < initial_loss);
}

#[test]
fn test_solve_falls_back_on_indefinite_system() {
    use gensvm::matrix::solve_sym_system;

    // symmetric but indefinite, so the Cholesky attempt must fail
    let a = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]);
    let b = DMatrix::from_row_slice(2, 1, &[1.0, 2.0]);
    let x = solve_sym_system(&a, &b).expect("indefinite fallback solves this");
    assert_abs_diff_eq!(x[(0, 0)], 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(x[(1, 0)], 1.0, epsilon = 1e-12);
    assert!(x.iter().all(|v| v.is_finite()));

    // singular systems are an error even after the fallback
    let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
    assert!(solve_sym_system(&a, &b).is_err());
}

#[test]
fn test_train_rejects_invalid_parameters() {
    let y = LOSS_FIXTURE_Y;
    let mut data = dense_dataset(loss_fixture_z(), &y, 3);

    let mut model = SvmModel::new();
    model.p = 3.0;
    assert!(model.train(&mut data, None).is_err());

    let mut model = SvmModel::new();
    model.lambda = -1.0;
    assert!(model.train(&mut data, None).is_err());

    let mut model = SvmModel::new();
    model.kappa = -1.0;
    assert!(model.train(&mut data, None).is_err());

    let mut model = SvmModel::new();
    model.epsilon = 0.0;
    assert!(model.train(&mut data, None).is_err());
}
