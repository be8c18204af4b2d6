/// Q64.96 square-root price codec.
pub mod fixed_point;
