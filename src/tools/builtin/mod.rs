// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in tools for Parley

mod computer_use;
mod image_generation;
mod weather;
mod web_search;

pub use computer_use::ComputerUseTool;
pub use image_generation::ImageGenerationTool;
pub use weather::WeatherTool;
pub use web_search::WebSearchTool;
