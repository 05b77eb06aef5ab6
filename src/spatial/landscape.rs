//! Immutable input layers loaded at boot
//!
//! The landscape owns every read-only raster the engine consumes: the
//! historical urban extents, road networks, slope, exclusion, background,
//! and optional land-use classifications. All layers share the shape of
//! the first-loaded raster; a mismatch is fatal at load time.

use crate::io::configuration::{EXCLUDED, ROAD};
use crate::io::error::{Result, SimError, invalid_parameter};
use crate::io::raster::load_grid;
use crate::io::scenario::Scenario;
use crate::spatial::grid::{Comparator, PixelGrid};

/// One raster tagged with its observation year
#[derive(Debug, Clone)]
pub struct YearLayer {
    /// Calendar year the raster depicts
    pub year: u32,
    /// The raster itself
    pub grid: PixelGrid,
}

/// The complete set of read-only input layers
pub struct Landscape {
    urban: Vec<YearLayer>,
    roads: Vec<YearLayer>,
    road_pixel_counts: Vec<usize>,
    slope: PixelGrid,
    excluded: PixelGrid,
    background: PixelGrid,
    landuse: Vec<YearLayer>,
    excluded_count: usize,
}

fn check_shape(expected: (usize, usize), layer: &PixelGrid, name: &str) -> Result<()> {
    if layer.dim() == expected {
        Ok(())
    } else {
        Err(SimError::ShapeMismatch {
            path: name.into(),
            expected,
            found: layer.dim(),
        })
    }
}

impl Landscape {
    /// Load every input raster named by the scenario
    ///
    /// # Errors
    ///
    /// Returns an error when a raster cannot be read, shapes disagree, or
    /// a mandatory layer is missing.
    pub fn load(scenario: &Scenario) -> Result<Self> {
        let mut urban = Vec::new();
        for (year, path) in &scenario.urban_files {
            urban.push(YearLayer {
                year: *year,
                grid: load_grid(path)?,
            });
        }

        let mut roads = Vec::new();
        for (year, path) in &scenario.road_files {
            roads.push(YearLayer {
                year: *year,
                grid: load_grid(path)?,
            });
        }

        let mut landuse = Vec::new();
        for (year, path) in &scenario.landuse_files {
            landuse.push(YearLayer {
                year: *year,
                grid: load_grid(path)?,
            });
        }

        let slope = load_grid(&scenario.slope_file)?;
        let excluded = load_grid(&scenario.excluded_file)?;
        let background = load_grid(&scenario.background_file)?;

        Self::from_grids(urban, roads, slope, excluded, background, landuse)
    }

    /// Assemble a landscape from already-built grids
    ///
    /// # Errors
    ///
    /// Returns an error when no urban or road layer is present or any
    /// layer's shape differs from the first urban raster.
    pub fn from_grids(
        mut urban: Vec<YearLayer>,
        mut roads: Vec<YearLayer>,
        slope: PixelGrid,
        excluded: PixelGrid,
        background: PixelGrid,
        mut landuse: Vec<YearLayer>,
    ) -> Result<Self> {
        let Some(first) = urban.first() else {
            return Err(invalid_parameter(
                "urban_files",
                &"<empty>",
                &"at least one urban control year is required",
            ));
        };
        let shape = first.grid.dim();

        urban.sort_by_key(|l| l.year);
        roads.sort_by_key(|l| l.year);
        landuse.sort_by_key(|l| l.year);

        if roads.is_empty() {
            return Err(invalid_parameter(
                "road_files",
                &"<empty>",
                &"at least one road layer is required",
            ));
        }

        for layer in &urban {
            check_shape(shape, &layer.grid, &format!("urban.{}", layer.year))?;
        }
        for layer in &roads {
            check_shape(shape, &layer.grid, &format!("roads.{}", layer.year))?;
        }
        for layer in &landuse {
            check_shape(shape, &layer.grid, &format!("landuse.{}", layer.year))?;
        }
        check_shape(shape, &slope, "slope")?;
        check_shape(shape, &excluded, "excluded")?;
        check_shape(shape, &background, "background")?;

        // Normalize road layers to {0, ROAD} so rule 4 only tests presence.
        let mut road_pixel_counts = Vec::with_capacity(roads.len());
        for layer in &mut roads {
            let raw = layer.grid.clone();
            layer.grid.fill(0);
            layer.grid.conditional_set(&raw, Comparator::Gt, 0, ROAD);
            road_pixel_counts.push(layer.grid.count(Comparator::Gt, 0));
        }

        let excluded_count = excluded.count(Comparator::Ge, EXCLUDED);

        Ok(Self {
            urban,
            roads,
            road_pixel_counts,
            slope,
            excluded,
            background,
            landuse,
            excluded_count,
        })
    }

    /// Number of rows shared by every layer
    pub fn nrows(&self) -> usize {
        self.slope.nrows()
    }

    /// Number of columns shared by every layer
    pub fn ncols(&self) -> usize {
        self.slope.ncols()
    }

    /// Total pixels per layer
    pub fn total_pixels(&self) -> usize {
        self.slope.total_pixels()
    }

    /// Pixels that may legally urbanize (total minus excluded)
    pub fn urbanizable_pixels(&self) -> usize {
        self.total_pixels() - self.excluded_count
    }

    /// Count of excluded pixels
    pub const fn excluded_count(&self) -> usize {
        self.excluded_count
    }

    /// Urban control layers in year order
    pub fn urban_layers(&self) -> &[YearLayer] {
        &self.urban
    }

    /// Years of the urban control layers, ascending
    pub fn urban_years(&self) -> Vec<u32> {
        self.urban.iter().map(|l| l.year).collect()
    }

    /// Earliest urban control layer (the Z seed)
    ///
    /// # Panics
    ///
    /// Panics only if construction somehow admitted an empty urban list,
    /// which `from_grids` rejects.
    pub fn earliest_urban(&self) -> &YearLayer {
        &self.urban[0]
    }

    /// Latest urban control layer
    ///
    /// # Panics
    ///
    /// Panics only if construction somehow admitted an empty urban list,
    /// which `from_grids` rejects.
    pub fn latest_urban(&self) -> &YearLayer {
        &self.urban[self.urban.len() - 1]
    }

    /// Urban control layer for an exact year, when one exists
    pub fn urban_by_year(&self, year: u32) -> Option<&PixelGrid> {
        self.urban
            .iter()
            .find(|l| l.year == year)
            .map(|l| &l.grid)
    }

    /// Road layer in effect for a year: the latest layer dated at or
    /// before it, else the earliest layer
    pub fn road_for_year(&self, year: u32) -> (&PixelGrid, usize) {
        let index = self
            .roads
            .iter()
            .rposition(|l| l.year <= year)
            .unwrap_or(0);
        let count = self.road_pixel_counts.get(index).copied().unwrap_or(0);
        match self.roads.get(index) {
            Some(layer) => (&layer.grid, count),
            // Unreachable: construction guarantees a road layer.
            None => (&self.slope, 0),
        }
    }

    /// Percent slope layer
    pub const fn slope(&self) -> &PixelGrid {
        &self.slope
    }

    /// Exclusion layer
    pub const fn excluded(&self) -> &PixelGrid {
        &self.excluded
    }

    /// Background layer used for image composition
    pub const fn background(&self) -> &PixelGrid {
        &self.background
    }

    /// Land-use layers in year order (possibly empty)
    pub fn landuse_layers(&self) -> &[YearLayer] {
        &self.landuse
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(year: u32, nrows: usize, ncols: usize) -> YearLayer {
        YearLayer {
            year,
            grid: PixelGrid::new(nrows, ncols),
        }
    }

    fn basic_landscape() -> Landscape {
        let mut road_1990 = PixelGrid::new(6, 6);
        road_1990.set(3, 3, 17);
        road_1990.set(3, 4, 250);
        let mut road_1995 = PixelGrid::new(6, 6);
        road_1995.set(3, 3, 1);

        Landscape::from_grids(
            vec![layer(1995, 6, 6), layer(1990, 6, 6)],
            vec![
                YearLayer {
                    year: 1990,
                    grid: road_1990,
                },
                YearLayer {
                    year: 1995,
                    grid: road_1995,
                },
            ],
            PixelGrid::new(6, 6),
            PixelGrid::new(6, 6),
            PixelGrid::new(6, 6),
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn layers_are_sorted_by_year() {
        let landscape = basic_landscape();
        assert_eq!(landscape.urban_years(), vec![1990, 1995]);
        assert_eq!(landscape.earliest_urban().year, 1990);
        assert_eq!(landscape.latest_urban().year, 1995);
    }

    #[test]
    fn roads_are_normalized_and_counted() {
        let landscape = basic_landscape();
        let (road, count) = landscape.road_for_year(1992);
        assert_eq!(count, 2);
        assert_eq!(road.get(3, 3), ROAD);
        assert_eq!(road.get(3, 4), ROAD);

        let (_, later_count) = landscape.road_for_year(1995);
        assert_eq!(later_count, 1);

        // Years before the first road layer fall back to it.
        let (_, earliest) = landscape.road_for_year(1900);
        assert_eq!(earliest, 2);
    }

    #[test]
    fn shape_mismatch_is_fatal() {
        let result = Landscape::from_grids(
            vec![layer(1990, 6, 6)],
            vec![layer(1990, 6, 7)],
            PixelGrid::new(6, 6),
            PixelGrid::new(6, 6),
            PixelGrid::new(6, 6),
            Vec::new(),
        );
        assert!(matches!(result, Err(SimError::ShapeMismatch { .. })));
    }

    #[test]
    fn excluded_pixels_reduce_urbanizable_count() {
        let mut excluded = PixelGrid::new(6, 6);
        excluded.set(0, 0, EXCLUDED);
        excluded.set(1, 1, 255);
        excluded.set(2, 2, 40);
        let landscape = Landscape::from_grids(
            vec![layer(1990, 6, 6)],
            vec![layer(1990, 6, 6)],
            PixelGrid::new(6, 6),
            excluded,
            PixelGrid::new(6, 6),
            Vec::new(),
        )
        .unwrap();
        assert_eq!(landscape.excluded_count(), 2);
        assert_eq!(landscape.urbanizable_pixels(), 34);
    }

    #[test]
    fn missing_urban_layer_is_rejected() {
        let result = Landscape::from_grids(
            Vec::new(),
            vec![layer(1990, 6, 6)],
            PixelGrid::new(6, 6),
            PixelGrid::new(6, 6),
            PixelGrid::new(6, 6),
            Vec::new(),
        );
        assert!(result.is_err());
    }
}
