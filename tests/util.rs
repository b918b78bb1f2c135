#![allow(dead_code)]
use mesh_pierced::containers::PiercedKernel;

/// Kernel holding `ids` appended in order.
pub fn kernel_from(ids: &[u32]) -> PiercedKernel<u32> {
    let mut k = PiercedKernel::new();
    for &id in ids {
        k.insert_append(id).unwrap();
    }
    k
}

/// Live ids in position order.
pub fn order(k: &PiercedKernel<u32>) -> Vec<u32> {
    k.ids().collect()
}

/// `(id, position)` pairs in position order.
pub fn layout(k: &PiercedKernel<u32>) -> Vec<(u32, usize)> {
    k.iter().collect()
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Copy + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}
