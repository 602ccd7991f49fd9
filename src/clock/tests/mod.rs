mod disciplined;
