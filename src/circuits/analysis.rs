//! Power accounting of a driven solution.

use crate::math::Scalar;

use super::network::StructureSolution;

/// Where the source power goes, in watts.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerBudget {
    /// Power delivered by all sources.
    pub input: Scalar,
    /// Input less every loss.
    pub radiated: Scalar,
    /// Power dissipated in the segment loads.
    pub structure_loss: Scalar,
    /// Power dissipated in the networks.
    pub network_loss: Scalar,
    /// Radiated over input power in percent; zero without input power.
    pub efficiency: Scalar,
}

impl PowerBudget {
    /// Budget from the input power and the two losses.
    #[must_use]
    pub fn new(input: Scalar, structure_loss: Scalar, network_loss: Scalar) -> Self {
        let radiated = input - structure_loss - network_loss;
        let efficiency = if input != 0.0 { 100.0 * radiated / input } else { 0.0 };
        Self {
            input,
            radiated,
            structure_loss,
            network_loss,
            efficiency,
        }
    }

    /// Budget of `solution` given the loss in the segment loads.
    #[must_use]
    pub fn of(solution: &StructureSolution, structure_loss: Scalar) -> Self {
        Self::new(solution.input_power, structure_loss, solution.network_loss)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn losses_come_out_of_the_input() {
        let b = PowerBudget::new(2.0, 0.3, 0.2);
        assert_relative_eq!(b.radiated, 1.5, epsilon = 1.0e-15);
        assert_relative_eq!(b.efficiency, 75.0, epsilon = 1.0e-12);
    }

    #[test]
    fn no_input_means_no_efficiency() {
        let b = PowerBudget::new(0.0, 0.0, 0.0);
        assert_eq!(b.efficiency, 0.0);
        assert_eq!(b.radiated, 0.0);
    }
}
