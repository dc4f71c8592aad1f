use ndarray::Array2;

/// Opening (erosion then dilation) with a 3x3 square element.
/// Removes specks smaller than the element while keeping larger regions.
pub fn morphological_opening(mask: &Array2<bool>) -> Array2<bool> {
    dilate(&erode(mask))
}

fn neighbourhood(mask: &Array2<bool>, row: usize, col: usize) -> impl Iterator<Item = Option<bool>> + '_ {
    let (h, w) = mask.dim();
    (-1..=1isize).flat_map(move |dr| {
        (-1..=1isize).map(move |dc| {
            let r = row as isize + dr;
            let c = col as isize + dc;
            if r < 0 || c < 0 || r >= h as isize || c >= w as isize {
                None
            } else {
                Some(mask[[r as usize, c as usize]])
            }
        })
    })
}

/// Out-of-bounds neighbours count as background.
fn erode(mask: &Array2<bool>) -> Array2<bool> {
    Array2::from_shape_fn(mask.dim(), |(r, c)| {
        mask[[r, c]] && neighbourhood(mask, r, c).all(|v| v == Some(true))
    })
}

fn dilate(mask: &Array2<bool>) -> Array2<bool> {
    Array2::from_shape_fn(mask.dim(), |(r, c)| {
        neighbourhood(mask, r, c).any(|v| v == Some(true))
    })
}
