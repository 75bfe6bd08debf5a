// Building blocks of the targeting pipeline.

pub mod aim;
pub mod clock;
pub mod detection;
pub mod fire_control;
pub mod frame;
pub mod motion_detector;
pub mod peripherals;
pub mod reference_frame;
pub mod storage;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_support;
