use burn::prelude::*;

use crate::config::ImageOrdering;

/// Bilinear resize of a channels-first batch to `[height, width]`.
///
/// Sampling follows half-pixel centers with edge clamping. The resize is
/// written as two matrix products, `Ah · x · Awᵀ`, so it stays differentiable
/// on every backend. Returns the input untouched when it already has the
/// requested size.
pub fn resize_to<B: Backend>(x: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
    let [batch_size, channels, height, width] = x.dims();
    if [height, width] == size {
        return x;
    }

    let [out_height, out_width] = size;
    let device = x.device();
    let planes = batch_size * channels;

    let rows = interpolation_matrix::<B>(height, out_height, &device)
        .unsqueeze::<3>()
        .expand([planes, out_height, height]);
    let cols = interpolation_matrix::<B>(width, out_width, &device)
        .transpose()
        .unsqueeze::<3>()
        .expand([planes, width, out_width]);

    let x = x.reshape([planes, height, width]);
    let x = rows.matmul(x).matmul(cols);

    x.reshape([batch_size, channels, out_height, out_width])
}

/// `[output, input]` weights of a 1-D linear interpolation; every row sums to 1.
fn interpolation_matrix<B: Backend>(
    input: usize,
    output: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let mut weights = vec![0.0f32; output * input];
    let scale = input as f32 / output as f32;

    for row in 0..output {
        let source = ((row as f32 + 0.5) * scale - 0.5).clamp(0.0, (input - 1) as f32);
        let low = source.floor() as usize;
        let high = (low + 1).min(input - 1);
        let fraction = source - low as f32;

        weights[row * input + low] += 1.0 - fraction;
        weights[row * input + high] += fraction;
    }

    Tensor::from_data(
        TensorData::new(weights, Shape::new([output, input])).convert::<B::FloatElem>(),
        device,
    )
}

/// Scales the spatial dimensions of a batch by integer `[height, width]` factors.
pub fn resize_image<B: Backend>(
    x: Tensor<B, 4>,
    factors: [usize; 2],
    ordering: &ImageOrdering,
) -> Tensor<B, 4> {
    let (_, [height, width]) = ordering.split_dims(x.dims());
    let x = ordering.to_channels_first(x);
    let x = resize_to(x, [height * factors[0], width * factors[1]]);

    ordering.from_channels_first(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray;

    #[test]
    fn resize_image_scales_spatial_dims() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::ones([1, 4, 6, 2], &device);

        let resized = resize_image(x, [2, 3], &ImageOrdering::ChannelsLast);

        assert_eq!(resized.dims(), [1, 8, 18, 2]);
    }

    #[test]
    fn bilinear_resize_keeps_constant_values() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::full([1, 2, 3, 3], 0.25, &device);

        let resized = resize_to(x, [6, 9]);
        let values = resized.into_data().to_vec::<f32>().unwrap();

        assert_eq!(values.len(), 2 * 6 * 9);
        assert!(values.iter().all(|v| (v - 0.25).abs() < 1e-5));
    }

    #[test]
    fn upsampling_interpolates_between_neighbours() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::from_floats([[[[0.0, 4.0]]]], &device);

        let values = resize_to(x, [1, 4]).into_data().to_vec::<f32>().unwrap();

        // Half-pixel centers land at -0.25, 0.25, 0.75 and 1.25 of the input.
        let expected = [0.0, 1.0, 3.0, 4.0];
        for (value, expected) in values.iter().zip(expected) {
            assert!((value - expected).abs() < 1e-5, "{values:?}");
        }
    }

    #[test]
    fn downsampling_averages_pixel_pairs() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::from_floats([[[[1.0, 3.0, 5.0, 7.0]]]], &device);

        let values = resize_to(x, [1, 2]).into_data().to_vec::<f32>().unwrap();

        assert!((values[0] - 2.0).abs() < 1e-5);
        assert!((values[1] - 6.0).abs() < 1e-5);
    }

    #[test]
    fn resize_propagates_gradients() {
        let device = Default::default();
        let x = Tensor::<Autodiff<TestBackend>, 4>::ones([2, 3, 4, 5], &device).require_grad();

        let grads = resize_to(x.clone(), [7, 3]).sum().backward();
        let grad = x.grad(&grads).unwrap();

        assert_eq!(grad.dims(), [2, 3, 4, 5]);
        // Every output pixel spreads a total weight of 1 over the input.
        let total = grad.sum().into_scalar();
        assert!((total - (2 * 3 * 7 * 3) as f32).abs() < 1e-3);
    }
}
