mod binding;
mod query;
