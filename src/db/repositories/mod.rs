mod cycles;
mod directory;
mod pauses;
