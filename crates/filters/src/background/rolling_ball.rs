//! Rolling-ball background subtraction
//!
//! Sternberg's paraboloid algorithm: a ball of the requested radius rolls
//! under every image plane and the surface it reaches is the background
//! envelope, which is subtracted from the original. Large radii shrink the
//! plane first (min-pooling preserves the envelope's lower hull), roll over
//! the small image, and bilinearly enlarge the background back.
//!
//! The roll keeps a cache of one kernel-width of image rows; rows are
//! absorbed into the cache and marked -inf in the working image, then the
//! second footprint pass raises them to the ball surface.

use std::marker::PhantomData;

use ndarray::Array2;
use voxseg_core::{Error, Filter, Result, Volume, VolumeElement};

/// The ball kernel: a square patch of heights over the ball footprint.
#[derive(Debug, Clone)]
pub struct RollingBall {
    width: usize,
    shrink_factor: usize,
    data: Vec<f32>,
}

impl RollingBall {
    /// Build the ball for a requested radius.
    ///
    /// The shrink factor and arc trim follow the classic radius cases:
    /// small balls roll at full resolution, large balls roll over a
    /// min-pooled image with a trimmed footprint.
    pub fn new(radius: f64) -> Self {
        let (shrink_factor, arc_trim_percent) = if radius <= 10.0 {
            (1, 24.0)
        } else if radius <= 30.0 {
            (2, 24.0)
        } else if radius <= 100.0 {
            (4, 32.0)
        } else {
            (8, 40.0)
        };

        let small_radius = (radius / shrink_factor as f64).max(1.0);
        let half_width = (small_radius * (1.0 - arc_trim_percent / 100.0)).round() as usize;
        let width = 2 * half_width + 1;
        let radius_squared = small_radius * small_radius;

        let mut data = vec![0f32; width * width];
        for y in 0..width {
            for x in 0..width {
                let dx = x as f64 - half_width as f64;
                let dy = y as f64 - half_width as f64;
                let height_squared = radius_squared - dx * dx - dy * dy;
                if height_squared > 0.0 {
                    data[y * width + x] = height_squared.sqrt() as f32;
                }
            }
        }

        Self {
            width,
            shrink_factor,
            data,
        }
    }

    /// Kernel patch width `2 * half_width + 1`
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn shrink_factor(&self) -> usize {
        self.shrink_factor
    }
}

/// Parameters for background subtraction
#[derive(Debug, Clone)]
pub struct BackgroundSubtractParams {
    /// Ball radius in pixels
    pub radius: f64,
}

impl Default for BackgroundSubtractParams {
    fn default() -> Self {
        Self { radius: 50.0 }
    }
}

/// Rolling-ball background subtraction filter
#[derive(Debug, Clone, Default)]
pub struct BackgroundSubtract<T>(PhantomData<T>);

impl<T: VolumeElement> Filter for BackgroundSubtract<T> {
    type Input = Volume<T>;
    type Output = Volume<T>;
    type Params = BackgroundSubtractParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "BackgroundSubtract"
    }

    fn description(&self) -> &'static str {
        "Subtract the rolling-ball background envelope, plane by plane"
    }

    fn execute(&self, mut input: Self::Input, params: Self::Params) -> Result<Volume<T>> {
        subtract_background(&mut input, params.radius)?;
        Ok(input)
    }
}

/// Subtract the rolling-ball background from every Z-plane of `volume`,
/// in place.
///
/// # Arguments
/// * `volume` - Volume to flatten; any fused element type
/// * `radius` - Ball radius in pixels
pub fn subtract_background<T: VolumeElement>(volume: &mut Volume<T>, radius: f64) -> Result<()> {
    if radius <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "radius",
            value: radius.to_string(),
            reason: "ball radius must be positive".to_string(),
        });
    }

    let ball = RollingBall::new(radius);
    let shape = volume.shape();
    let (rows, cols) = (shape.y, shape.x);

    tracing::debug!(
        %shape,
        radius,
        shrink = ball.shrink_factor,
        kernel_width = ball.width,
        "rolling-ball background subtraction"
    );

    for z in 0..shape.z {
        let plane = volume.plane_mut(z)?;
        subtract_plane(plane, rows, cols, &ball);
    }
    Ok(())
}

/// Compute the background envelope of one plane.
///
/// Exposed so the envelope invariant (background never exceeds the image)
/// is testable on its own.
pub fn background_of_plane<T: VolumeElement>(
    plane: &[T],
    rows: usize,
    cols: usize,
    ball: &RollingBall,
) -> Array2<f32> {
    let mut float_img: Vec<f32> = plane.iter().map(|&px| px.to_f64() as f32).collect();
    let shrink = ball.shrink_factor;

    if shrink > 1 {
        let small_rows = rows.div_ceil(shrink);
        let small_cols = cols.div_ceil(shrink);
        let mut small = shrink_plane(&float_img, rows, cols, shrink, small_rows, small_cols);
        roll_ball(&mut small, small_rows, small_cols, ball);
        let enlarged = enlarge_plane(&small, small_rows, small_cols, rows, cols, shrink);
        Array2::from_shape_vec((rows, cols), enlarged).expect("shape matches buffer")
    } else {
        roll_ball(&mut float_img, rows, cols, ball);
        Array2::from_shape_vec((rows, cols), float_img).expect("shape matches buffer")
    }
}

fn subtract_plane<T: VolumeElement>(plane: &mut [T], rows: usize, cols: usize, ball: &RollingBall) {
    let background = background_of_plane(plane, rows, cols, ball);
    let max = T::max_value().to_f64();

    for y in 0..rows {
        for x in 0..cols {
            let original = plane[y * cols + x].to_f64();
            let rounded = (background[(y, x)] as f64 + 0.5).floor();
            let value = (original - rounded).clamp(0.0, max);
            plane[y * cols + x] = T::from_f64_clamped(value);
        }
    }
}

/// Min-pool `img` into blocks of `shrink x shrink`, clipped at the borders.
fn shrink_plane(
    img: &[f32],
    rows: usize,
    cols: usize,
    shrink: usize,
    small_rows: usize,
    small_cols: usize,
) -> Vec<f32> {
    let mut small = vec![0f32; small_rows * small_cols];
    for sy in 0..small_rows {
        for sx in 0..small_cols {
            let mut min = f32::INFINITY;
            for y in (shrink * sy)..(shrink * sy + shrink).min(rows) {
                for x in (shrink * sx)..(shrink * sx + shrink).min(cols) {
                    let v = img[y * cols + x];
                    if v < min {
                        min = v;
                    }
                }
            }
            small[sy * small_cols + sx] = min;
        }
    }
    small
}

/// Roll the ball under `img`, replacing it with the background envelope.
fn roll_ball(img: &mut [f32], rows: usize, cols: usize, ball: &RollingBall) {
    if rows == 0 || cols == 0 {
        return;
    }

    let width = ball.width;
    let half = (width / 2) as isize;
    let ball_data = &ball.data;
    let rows_i = rows as isize;
    let cols_i = cols as isize;

    let mut cache = vec![0f32; width * cols];

    for y in -half..rows_i + half {
        // absorb the incoming row into the cache and mark it in the image
        let next_line = y + half;
        if next_line < rows_i {
            let src = next_line as usize * cols;
            let dst = (next_line as usize % width) * cols;
            cache[dst..dst + cols].copy_from_slice(&img[src..src + cols]);
            for px in &mut img[src..src + cols] {
                *px = f32::NEG_INFINITY;
            }
        }

        let y0 = (y - half).max(0);
        let y_ball_0 = y0 - y + half;
        let y_end = (y + half).min(rows_i - 1);

        for x in -half..cols_i + half {
            let x0 = (x - half).max(0);
            let x_ball_0 = x0 - x + half;
            let x_end = (x + half).min(cols_i - 1);

            // pass 1: how high can the ball center rise while its surface
            // stays at or below the image over the clipped footprint
            let mut z = f32::INFINITY;
            let mut ball_y = y_ball_0;
            for yp in y0..=y_end {
                let cache_row = (yp as usize % width) * cols;
                let ball_row = ball_y as usize * width;
                let mut ball_x = x_ball_0;
                for xp in x0..=x_end {
                    let reduced = cache[cache_row + xp as usize] - ball_data[ball_row + ball_x as usize];
                    if reduced < z {
                        z = reduced;
                    }
                    ball_x += 1;
                }
                ball_y += 1;
            }

            // pass 2: raise the background to the ball surface at z
            let mut ball_y = y_ball_0;
            for yp in y0..=y_end {
                let img_row = yp as usize * cols;
                let ball_row = ball_y as usize * width;
                let mut ball_x = x_ball_0;
                for xp in x0..=x_end {
                    let lifted = z + ball_data[ball_row + ball_x as usize];
                    let cell = &mut img[img_row + xp as usize];
                    if lifted > *cell {
                        *cell = lifted;
                    }
                    ball_x += 1;
                }
                ball_y += 1;
            }
        }
    }
}

/// Index/weight tables for one axis of the bilinear enlarge.
fn interp_tables(len: usize, small_len: usize, shrink: usize) -> (Vec<usize>, Vec<f32>) {
    let max_index = small_len.saturating_sub(2);
    let mut indices = vec![0usize; len];
    let mut weights = vec![0f32; len];

    for i in 0..len {
        let raw = (i as isize - shrink as isize / 2).div_euclid(shrink as isize);
        let clamped = raw.clamp(0, max_index as isize) as usize;
        debug_assert!(small_len == 1 || clamped + 1 < small_len);
        indices[i] = clamped;
        weights[i] = 1.0 - ((i as f32 + 0.5) / shrink as f32 - (clamped as f32 + 0.5));
    }

    (indices, weights)
}

/// Bilinearly interpolate the shrunken background back to full resolution.
fn enlarge_plane(
    small: &[f32],
    small_rows: usize,
    small_cols: usize,
    rows: usize,
    cols: usize,
    shrink: usize,
) -> Vec<f32> {
    let (row_indices, row_weights) = interp_tables(rows, small_rows, shrink);
    let (col_indices, col_weights) = interp_tables(cols, small_cols, shrink);

    let mut out = vec![0f32; rows * cols];
    for y in 0..rows {
        let yi = row_indices[y];
        let y2 = (yi + 1).min(small_rows - 1);
        let wy = row_weights[y];
        for x in 0..cols {
            let xi = col_indices[x];
            let x2 = (xi + 1).min(small_cols - 1);
            let wx = col_weights[x];

            let top = small[yi * small_cols + xi] * wx + small[yi * small_cols + x2] * (1.0 - wx);
            let bottom = small[y2 * small_cols + xi] * wx + small[y2 * small_cols + x2] * (1.0 - wx);
            out[y * cols + x] = top * wy + bottom * (1.0 - wy);
        }
    }
    out
}
