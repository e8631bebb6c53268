mod aml;
mod clone;
mod coerce;
mod odata;
mod sql;
