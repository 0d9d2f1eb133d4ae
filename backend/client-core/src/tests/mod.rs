mod effects;
mod monitor;
mod packet;
mod reducer;
mod route;
mod store;
