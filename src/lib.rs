/*!
# UltiTracker

A small multi-tenant dashboard where sports-team members log the time they
spend on training tasks. There is no local database: every team's data lives
in its own Google Sheets spreadsheet, and every page is built from a fresh
read of that sheet.

## Overview

Each team is a section of the config file naming the spreadsheet and the
three column ranges it uses (players, tasks, stats). The team for a request
is the first label of the host name, so `hawks.example.com` serves the
`hawks` team.

## Pages

- `/` - Entry form (player, task, duration, date, notes)
- `/leaderboard` - Overall and per-task leaderboards, top N people each
- `/tasks` - Per-task breakdown for a date range (last 7 days by default)
- `/submit-entry` - JSON endpoint appending one row to the stats range

## Data flow

1. The stats range is fetched through a [`spreadsheet::SheetSource`]
2. [`entry::normalize`] turns raw rows into [`entry::TimeEntry`] values,
   silently skipping rows whose duration does not parse
3. [`ranking::rankings`] and [`ranking::task_breakdown`] sum hours per
   person, order people and rankings by descending score
4. The result is rendered through handlebars templates

## Modules

- **entry**: Row normalizer
- **ranking**: Aggregation and ranking engine
- **spreadsheet**: A1 ranges and the Google Sheets client
- **config**: Config file and the team registry
- **saving**: Duration labels and appending submitted entries
- **views**: Page templates
- **app**: Routing and handlers
*/

pub mod entry;
pub mod ranking;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;
#[cfg(feature = "web")]
pub mod error;
#[cfg(feature = "web")]
pub mod saving;
#[cfg(feature = "web")]
pub mod spreadsheet;
#[cfg(feature = "web")]
pub mod views;

/// Re-export the engine to make it easier to use
pub use entry::*;
pub use ranking::*;
