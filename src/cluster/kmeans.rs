use log::debug;
use ndarray::{Array2, ArrayView1, Axis};
use rand::{distr::{weighted::WeightedIndex, Distribution}, rngs::StdRng, Rng, SeedableRng};

const N_INIT: usize = 10;
const MAX_ITER: usize = 300;
const TOL: f64 = 1e-4;

#[inline]
fn sq_dist(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index and squared distance of the nearest center to `point`.
fn nearest(point: ArrayView1<f64>, centers: &Array2<f64>) -> (usize, f64) {
    centers.rows().into_iter().enumerate()
        .map(|(c, center)| (c, sq_dist(point, center)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

/// k-means++ seeding: each new center is drawn with probability
/// proportional to its squared distance from the nearest chosen center.
fn seed_centers(data: &Array2<f64>, k: usize, rng: &mut impl Rng) -> Array2<f64> {
    let n = data.nrows();
    let mut chosen = vec![rng.random_range(0..n)];
    let mut dist = data.rows().into_iter().map(|p| sq_dist(p, data.row(chosen[0]))).collect::<Vec<_>>();

    while chosen.len() < k {
        let next = match WeightedIndex::new(&dist) {
            Ok(weights) => weights.sample(rng),
            Err(_) => rng.random_range(0..n), // all remaining points coincide with a center
        };
        chosen.push(next);
        for (i, p) in data.rows().into_iter().enumerate() {
            dist[i] = dist[i].min(sq_dist(p, data.row(next)));
        }
    }

    data.select(Axis(0), &chosen)
}

/// One Lloyd run from the given centers. Returns (labels, inertia).
fn lloyd(data: &Array2<f64>, mut centers: Array2<f64>, tol: f64) -> (Vec<usize>, f64) {
    let (n, k) = (data.nrows(), centers.nrows());
    let mut labels = vec![0; n];

    for iteration in 0..MAX_ITER {
        let mut dists = vec![0.0; n];
        for (i, p) in data.rows().into_iter().enumerate() {
            (labels[i], dists[i]) = nearest(p, &centers);
        }

        let mut sums = Array2::<f64>::zeros(centers.raw_dim());
        let mut counts = vec![0usize; k];
        for (i, p) in data.rows().into_iter().enumerate() {
            sums.row_mut(labels[i]).scaled_add(1.0, &p);
            counts[labels[i]] += 1;
        }

        // An empty cluster takes the point currently farthest from its center.
        for c in 0..k {
            if counts[c] > 0 { continue }
            let far = (0..n)
                .filter(|&i| counts[labels[i]] > 1)
                .max_by(|&a, &b| dists[a].total_cmp(&dists[b]));
            if let Some(i) = far {
                sums.row_mut(labels[i]).scaled_add(-1.0, &data.row(i));
                counts[labels[i]] -= 1;
                labels[i] = c;
                dists[i] = 0.0;
                sums.row_mut(c).assign(&data.row(i));
                counts[c] = 1;
            }
        }

        let mut shift = 0.0;
        for c in 0..k {
            if counts[c] == 0 { continue }
            let updated = &sums.row(c) / counts[c] as f64;
            shift += sq_dist(updated.view(), centers.row(c));
            centers.row_mut(c).assign(&updated);
        }

        if shift <= tol {
            debug!("k-means converged after {} iterations", iteration + 1);
            break;
        }
    }

    let inertia = data.rows().into_iter().enumerate()
        .map(|(i, p)| sq_dist(p, centers.row(labels[i])))
        .sum();
    (labels, inertia)
}

/// Lloyd's k-means with k-means++ seeding and several restarts, keeping the
/// run with the lowest inertia. Labels are 0..k in order of first appearance.
pub fn kmeans(data: &Array2<f64>, k: usize, seed: u64) -> Vec<usize> {
    let n = data.nrows();
    if n == 0 || k == 0 { return vec![0; n] }

    // Convergence threshold scales with the mean per-feature variance.
    let variance = data.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0);
    let tol = TOL * variance;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut best: Option<(Vec<usize>, f64)> = None;
    for _ in 0..N_INIT {
        let (labels, inertia) = lloyd(data, seed_centers(data, k.min(n), &mut rng), tol);
        if best.as_ref().is_none_or(|(_, b)| inertia < *b) { best = Some((labels, inertia)) }
    }

    let labels = best.map(|(labels, _)| labels).unwrap_or_else(|| vec![0; n]);
    let mut relabel = vec![usize::MAX; k];
    let mut next = 0;
    labels.iter().map(|&l| {
        if relabel[l] == usize::MAX { relabel[l] = next; next += 1 }
        relabel[l]
    }).collect()
}
