use rstest::rstest;

use edgesim::placement::{best_fit, first_fit, worst_fit, Candidate, FitStrategy, VmSelector};
use edgesim::resources::{VmClass, VmInfo};

fn candidates(available: &[f64], required: f64) -> Vec<Candidate> {
    available
        .iter()
        .enumerate()
        .map(|(i, a)| Candidate {
            vm: VmInfo {
                id: i as u32,
                host_id: 0,
                datacenter_id: 0,
                class: VmClass::Edge,
                mips: 1000.,
            },
            required,
            available: *a,
        })
        .collect()
}

fn no_random(_: usize) -> usize {
    panic!("random choice is not expected")
}

#[rstest]
#[case(FitStrategy::FirstFit, 15., Some(0))]
#[case(FitStrategy::BestFit, 15., Some(2))]
#[case(FitStrategy::WorstFit, 15., Some(1))]
#[case(FitStrategy::NextFit, 15., Some(0))]
#[case(FitStrategy::FirstFit, 60., None)]
#[case(FitStrategy::BestFit, 60., None)]
#[case(FitStrategy::WorstFit, 60., None)]
#[case(FitStrategy::NextFit, 60., None)]
fn test_strategies_on_host(#[case] strategy: FitStrategy, #[case] required: f64, #[case] expected: Option<usize>) {
    let mut selector = VmSelector::new(strategy);
    let vms = candidates(&[30., 55., 20.], required);
    assert_eq!(selector.select_on_host(0, &vms, no_random), expected);
}

#[test]
fn test_fit_helpers() {
    let vms = candidates(&[30., 55., 20.], 25.);
    assert_eq!(first_fit(vms.iter().enumerate()), Some(0));
    // 20 is tighter but can't take the task
    assert_eq!(best_fit(vms.iter().enumerate()), Some(0));
    assert_eq!(worst_fit(vms.iter().enumerate()), Some(1));
}

#[test]
fn test_required_equal_to_available_fits() {
    let vms = candidates(&[10., 40.], 40.);
    assert_eq!(best_fit(vms.iter().enumerate()), Some(1));
}

#[test]
fn test_next_fit_resumes_after_last_choice() {
    let mut selector = VmSelector::new(FitStrategy::NextFit);
    let vms = candidates(&[50., 50., 50., 50.], 10.);
    let picks: Vec<_> = (0..6).map(|_| selector.select_on_host(0, &vms, no_random)).collect();
    assert_eq!(picks, vec![Some(0), Some(1), Some(2), Some(3), Some(0), Some(1)]);
}

#[test]
fn test_next_fit_wraps_once() {
    let mut selector = VmSelector::new(FitStrategy::NextFit);
    let vms = candidates(&[50., 50., 50.], 10.);
    assert_eq!(selector.select_on_host(0, &vms, no_random), Some(0));
    assert_eq!(selector.select_on_host(0, &vms, no_random), Some(1));

    // only the VM before the cursor fits, reached after wrapping around
    let vms = candidates(&[50., 5., 5.], 10.);
    assert_eq!(selector.select_on_host(0, &vms, no_random), Some(0));

    // full cycle without a match
    let vms = candidates(&[5., 5., 5.], 10.);
    assert_eq!(selector.select_on_host(0, &vms, no_random), None);
}

#[test]
fn test_next_fit_cursors_are_per_host() {
    let mut selector = VmSelector::new(FitStrategy::NextFit);
    let vms = candidates(&[50., 50., 50.], 10.);
    assert_eq!(selector.select_on_host(0, &vms, no_random), Some(0));
    assert_eq!(selector.select_on_host(0, &vms, no_random), Some(1));
    assert_eq!(selector.select_on_host(1, &vms, no_random), Some(0));
    assert_eq!(selector.select_on_host(0, &vms, no_random), Some(2));
}

#[test]
fn test_random_fit_is_not_retried() {
    let mut selector = VmSelector::new(FitStrategy::RandomFit);
    let vms = candidates(&[30., 55., 20.], 25.);
    assert_eq!(selector.select_on_host(0, &vms, |n| n - 1), None);
    assert_eq!(selector.select_on_host(0, &vms, |_| 1), Some(1));
}

#[test]
fn test_pool_selection() {
    let hosts = vec![candidates(&[30., 20.], 15.), candidates(&[], 15.), candidates(&[55., 10.], 15.)];

    let mut selector = VmSelector::new(FitStrategy::BestFit);
    assert_eq!(selector.select_in_pool(&hosts, no_random), Some((0, 1)));
    let mut selector = VmSelector::new(FitStrategy::WorstFit);
    assert_eq!(selector.select_in_pool(&hosts, no_random), Some((2, 0)));
    let mut selector = VmSelector::new(FitStrategy::FirstFit);
    assert_eq!(selector.select_in_pool(&hosts, no_random), Some((0, 0)));
}

#[test]
fn test_pool_next_fit_moves_between_hosts() {
    let hosts = vec![candidates(&[30., 20.], 15.), candidates(&[], 15.), candidates(&[55., 10.], 15.)];
    let mut selector = VmSelector::new(FitStrategy::NextFit);
    let picks: Vec<_> = (0..4).map(|_| selector.select_in_pool(&hosts, no_random)).collect();
    assert_eq!(picks, vec![Some((0, 0)), Some((2, 0)), Some((0, 1)), Some((2, 0))]);
}

#[test]
fn test_pool_random_fit() {
    let hosts = vec![candidates(&[30., 20.], 15.), candidates(&[55., 10.], 15.)];
    let mut selector = VmSelector::new(FitStrategy::RandomFit);
    let mut picks = vec![1, 0].into_iter();
    assert_eq!(selector.select_in_pool(&hosts, |_| picks.next().unwrap()), Some((1, 0)));
    assert_eq!(selector.select_in_pool(&hosts, |n| n - 1), None);
}
