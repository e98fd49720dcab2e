use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig,
        Linear, LinearConfig,
        PaddingConfig2d, Relu,
    },
    prelude::*,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct AudioClassifierConfig {
    pub num_classes: usize,
    #[config(default = "vec![16, 32, 64, 128]")]
    pub channels:    Vec<usize>,
    #[config(default = 0.2)]
    pub dropout:     f64,
}

impl AudioClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> AudioClassifier<B> {
        let mut in_channels = 1;
        let mut blocks = Vec::with_capacity(self.channels.len());
        for &out_channels in &self.channels {
            blocks.push(ConvBlock {
                conv: Conv2dConfig::new([in_channels, out_channels], [3, 3])
                    .with_padding(PaddingConfig2d::Same)
                    .init(device),
                pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
                activation: Relu::new(),
            });
            in_channels = out_channels;
        }

        AudioClassifier {
            blocks,
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout:     DropoutConfig::new(self.dropout).init(),
            head:        LinearConfig::new(in_channels, self.num_classes).init(device),
        }
    }
}

/// conv 3×3 (same) → ReLU → max-pool 2×2
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv:       Conv2d<B>,
    pub pool:       MaxPool2d,
    pub activation: Relu,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.activation.forward(self.conv.forward(x));
        // max-pool needs at least a 2×2 plane
        let [_, _, h, w] = x.dims();
        if h < 2 || w < 2 {
            return x;
        }
        self.pool.forward(x)
    }
}

/// Small CNN over mel spectrograms.
#[derive(Module, Debug)]
pub struct AudioClassifier<B: Backend> {
    pub blocks:      Vec<ConvBlock<B>>,
    pub global_pool: AdaptiveAvgPool2d,
    pub dropout:     Dropout,
    pub head:        Linear<B>,
}

impl<B: Backend> AudioClassifier<B> {
    /// mels: [batch, 1, n_mels, frames] → logits: [batch, num_classes]
    pub fn forward(&self, mels: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = mels;
        for block in &self.blocks {
            x = block.forward(x);
        }
        let x = self.global_pool.forward(x); // [batch, channels, 1, 1]
        let [batch, channels, _, _] = x.dims();
        let x = self.dropout.forward(x.reshape([batch, channels]));
        self.head.forward(x)
    }
}
