use crate::uniforms::UniformLocations;

/// A linked program together with the uniform table resolved for it.
///
/// The generation is carried by the location table, so a table can never be
/// paired with a program it was not resolved from.
#[derive(Debug)]
pub struct CompiledProgram<P> {
    handle: P,
    locations: UniformLocations,
}

impl<P> CompiledProgram<P> {
    pub fn new(handle: P, locations: UniformLocations) -> Self {
        Self { handle, locations }
    }

    pub fn handle(&self) -> &P {
        &self.handle
    }

    pub fn locations(&self) -> &UniformLocations {
        &self.locations
    }

    pub fn generation(&self) -> u64 {
        self.locations.generation()
    }

    pub fn into_handle(self) -> P {
        self.handle
    }
}

/// Hands out strictly increasing program generations, starting at 1.
#[derive(Debug, Default)]
pub struct GenerationCounter {
    last: u64,
}

impl GenerationCounter {
    pub fn next(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    pub fn current(&self) -> u64 {
        self.last
    }
}
