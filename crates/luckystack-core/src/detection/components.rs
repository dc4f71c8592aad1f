use std::collections::HashMap;

use ndarray::Array2;

use crate::frame::Roi;

/// One 4-connected foreground region.
#[derive(Clone, Debug)]
pub struct Component {
    pub area: usize,
    pub bounds: Roi,
}

/// Two-pass union-find labeling with 4-connectivity.
///
/// Components are returned largest first.
pub fn connected_components(mask: &Array2<bool>) -> Vec<Component> {
    let (h, w) = mask.dim();
    let mut labels = Array2::<u32>::zeros((h, w));
    // Label 0 is background.
    let mut parent: Vec<u32> = vec![0];

    for row in 0..h {
        for col in 0..w {
            if !mask[[row, col]] {
                continue;
            }
            let up = if row > 0 { labels[[row - 1, col]] } else { 0 };
            let left = if col > 0 { labels[[row, col - 1]] } else { 0 };
            labels[[row, col]] = match (up, left) {
                (0, 0) => {
                    let label = parent.len() as u32;
                    parent.push(label);
                    label
                }
                (l, 0) | (0, l) => l,
                (a, b) => union(&mut parent, a, b),
            };
        }
    }

    // (area, min_row, max_row, min_col, max_col) per root label.
    let mut extents: HashMap<u32, (usize, usize, usize, usize, usize)> = HashMap::new();
    for ((row, col), &label) in labels.indexed_iter() {
        if label == 0 {
            continue;
        }
        let root = find(&parent, label);
        let e = extents.entry(root).or_insert((0, row, row, col, col));
        e.0 += 1;
        e.1 = e.1.min(row);
        e.2 = e.2.max(row);
        e.3 = e.3.min(col);
        e.4 = e.4.max(col);
    }

    let mut components: Vec<Component> = extents
        .into_values()
        .map(|(area, r0, r1, c0, c1)| Component {
            area,
            bounds: Roi {
                x: c0,
                y: r0,
                width: c1 - c0 + 1,
                height: r1 - r0 + 1,
            },
        })
        .collect();
    components.sort_unstable_by(|a, b| {
        b.area
            .cmp(&a.area)
            .then((a.bounds.y, a.bounds.x).cmp(&(b.bounds.y, b.bounds.x)))
    });
    components
}

fn find(parent: &[u32], mut x: u32) -> u32 {
    while parent[x as usize] != x {
        x = parent[x as usize];
    }
    x
}

/// Merge the two sets, returning the surviving (smaller) root.
fn union(parent: &mut [u32], a: u32, b: u32) -> u32 {
    let ra = find(parent, a);
    let rb = find(parent, b);
    let (small, big) = if ra < rb { (ra, rb) } else { (rb, ra) };
    parent[big as usize] = small;
    small
}
